// Diesel schema shared by the SQLite and Postgres backends.
// Tablas: users, medications, shifts, records, audit_logs, swap_requests,
// absences, activity_logs
use diesel::allow_tables_to_appear_in_same_query;
diesel::table! {
    users (id) {
        id -> Text,
        email -> Text,
        name -> Text,
        password_hash -> Text,
        role -> Text,
        telefone -> Nullable<Text>,
        telefone_whatsapp -> Nullable<Text>,
        callmebot_key -> Nullable<Text>,
        active -> Bool,
        first_login -> Bool,
        created_at_ms -> BigInt,
        updated_at_ms -> BigInt,
    }
}
diesel::table! {
    medications (id) {
        id -> Text,
        code -> Text,
        name -> Text,
        unit -> Text,
        location -> Nullable<Text>,
        created_at_ms -> BigInt,
        updated_at_ms -> BigInt,
    }
}
diesel::table! {
    shifts (id) {
        id -> Text,
        start_ms -> BigInt,
        end_ms -> BigInt,
        employee_id -> Nullable<Text>,
        notification_sent -> Bool,
        created_by -> Text,
        created_at_ms -> BigInt,
        updated_at_ms -> BigInt,
    }
}
diesel::table! {
    records (id) {
        id -> Text,
        med_id -> Text,
        shift_start_ms -> Nullable<BigInt>,
        shift_end_ms -> Nullable<BigInt>,
        qty_delivered -> Integer,
        qty_received -> Nullable<Integer>,
        delivered_by_id -> Text,
        delivered_at_ms -> BigInt,
        received_by_id -> Nullable<Text>,
        received_at_ms -> Nullable<BigInt>,
        photo_url -> Nullable<Text>,
        notes -> Nullable<Text>,
        status -> Text,
        created_by -> Text,
        created_at_ms -> BigInt,
        updated_at_ms -> BigInt,
    }
}
diesel::table! {
    audit_logs (id) {
        id -> Text,
        record_id -> Text,
        action -> Text,
        field -> Nullable<Text>,
        old_value -> Nullable<Text>,
        new_value -> Nullable<Text>,
        user_email -> Text,
        created_at_ms -> BigInt,
    }
}
diesel::table! {
    swap_requests (id) {
        id -> Text,
        shift_id -> Text,
        shift_date_ms -> BigInt,
        requester_id -> Text,
        requester_name -> Text,
        target_id -> Nullable<Text>,
        target_name -> Nullable<Text>,
        target_shift_id -> Nullable<Text>,
        reason -> Nullable<Text>,
        status -> Text,
        approved_by -> Nullable<Text>,
        approved_at_ms -> Nullable<BigInt>,
        responded_at_ms -> Nullable<BigInt>,
        created_at_ms -> BigInt,
        updated_at_ms -> BigInt,
    }
}
diesel::table! {
    absences (id) {
        id -> Text,
        user_id -> Text,
        user_name -> Text,
        user_email -> Nullable<Text>,
        date_ms -> BigInt,
        reason -> Text,
        description -> Nullable<Text>,
        created_at_ms -> BigInt,
    }
}
diesel::table! {
    activity_logs (id) {
        id -> Text,
        kind -> Text,
        user_id -> Text,
        user_name -> Text,
        user_email -> Nullable<Text>,
        entity_type -> Text,
        entity_id -> Text,
        description -> Text,
        metadata -> Text,
        created_at_ms -> BigInt,
    }
}
diesel::joinable!(records -> medications (med_id));
diesel::joinable!(absences -> users (user_id));
allow_tables_to_appear_in_same_query!(users,
                                      medications,
                                      shifts,
                                      records,
                                      audit_logs,
                                      swap_requests,
                                      absences,
                                      activity_logs);
