//! Proveedores externos del servicio de plantões: WhatsApp vía CallMeBot,
//! cifrado de las claves por usuario y un calendario sin proveedor real.
mod calendar;
mod errors;
mod notifier;
mod vault;
mod whatsapp;

pub use calendar::{CalendarClient, CalendarEvent, CalendarResult};
pub use errors::NotifyError;
pub use notifier::{shift_reminder, WhatsAppNotifier};
pub use vault::KeyVault;
pub use whatsapp::{clean_phone, CallMeBotClient, RecordingSender, SentMessage, WhatsAppSender, DEFAULT_CALLMEBOT_URL};
