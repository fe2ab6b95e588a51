//! Limitador en memoria con ventana deslizante, por IP de origen.
//!
//! Protege el envío manual de WhatsApp (10 solicitudes cada 15 minutos).
//! El número de IPs rastreadas tiene un tope; al alcanzarlo se limpian las
//! entradas vencidas y, si sigue lleno, la IP nueva se rechaza.

use std::{
    collections::HashMap,
    net::IpAddr,
    sync::{
        atomic::{AtomicU64, Ordering},
        PoisonError, RwLock,
    },
    time::{Duration, Instant},
};

use tracing::{debug, warn};

use crate::error::ApiError;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
    /// Cada cuántas solicitudes se purgan las IPs sin actividad reciente.
    pub cleanup_interval: u64,
    pub max_tracked_ips: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(15 * 60),
            cleanup_interval: 100,
            max_tracked_ips: 10_000,
        }
    }
}

pub struct RateLimiter {
    config: RateLimitConfig,
    state: RwLock<HashMap<IpAddr, Vec<Instant>>>,
    request_count: AtomicU64,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: RwLock::new(HashMap::new()),
            request_count: AtomicU64::new(0),
        }
    }

    /// Registra la solicitud de `ip` o devuelve [`ApiError::RateLimited`].
    pub fn check(&self, ip: IpAddr) -> Result<(), ApiError> {
        self.check_at(ip, Instant::now())
    }

    fn check_at(&self, ip: IpAddr, now: Instant) -> Result<(), ApiError> {
        let cutoff = now.checked_sub(self.config.window).unwrap_or(now);

        let count = self.request_count.fetch_add(1, Ordering::Relaxed);
        if count > 0 && count % self.config.cleanup_interval == 0 {
            debug!(request_count = count, "running periodic rate limiter cleanup");
            self.cleanup_at(now);
        }

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        if !state.contains_key(&ip) && state.len() >= self.config.max_tracked_ips {
            state.retain(|_, ts| ts.iter().any(|&t| t > cutoff));
            if state.len() >= self.config.max_tracked_ips {
                warn!(ip = %ip, "max tracked IPs reached, rejecting new IP");
                return Err(ApiError::RateLimited);
            }
        }

        let timestamps = state.entry(ip).or_default();
        timestamps.retain(|&t| t > cutoff);
        if timestamps.len() >= self.config.max_requests as usize {
            warn!(ip = %ip, requests = timestamps.len(), max = self.config.max_requests, "rate limit exceeded");
            return Err(ApiError::RateLimited);
        }
        timestamps.push(now);
        Ok(())
    }

    fn cleanup_at(&self, now: Instant) {
        let cutoff = now.checked_sub(self.config.window).unwrap_or(now);
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.retain(|_, ts| {
            ts.retain(|&t| t > cutoff);
            !ts.is_empty()
        });
    }

    #[cfg(test)]
    fn tracked_ips(&self) -> usize {
        self.state.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(last: u8) -> IpAddr {
        IpAddr::from([10, 0, 0, last])
    }

    #[test]
    fn allows_up_to_limit_then_rejects() {
        let limiter = RateLimiter::default();
        let now = Instant::now();
        for _ in 0..10 {
            assert!(limiter.check_at(ip(1), now).is_ok());
        }
        assert!(matches!(limiter.check_at(ip(1), now), Err(ApiError::RateLimited)));
        // otra IP tiene su propia ventana
        assert!(limiter.check_at(ip(2), now).is_ok());
    }

    #[test]
    fn window_slides() {
        let limiter = RateLimiter::new(RateLimitConfig {
            max_requests: 2,
            window: Duration::from_secs(10),
            ..Default::default()
        });
        let t0 = Instant::now();
        limiter.check_at(ip(1), t0).unwrap();
        limiter.check_at(ip(1), t0).unwrap();
        assert!(limiter.check_at(ip(1), t0 + Duration::from_secs(5)).is_err());
        assert!(limiter.check_at(ip(1), t0 + Duration::from_secs(11)).is_ok());
    }

    #[test]
    fn tracked_ips_are_capped() {
        let limiter = RateLimiter::new(RateLimitConfig {
            max_tracked_ips: 2,
            ..Default::default()
        });
        let now = Instant::now();
        limiter.check_at(ip(1), now).unwrap();
        limiter.check_at(ip(2), now).unwrap();
        assert!(limiter.check_at(ip(3), now).is_err());
        assert_eq!(limiter.tracked_ips(), 2);
    }
}
