//! Diesel table definitions for the operational market schema.
//!
//! Only the columns the fetcher touches are declared; the live tables carry
//! more.

diesel::table! {
    market.instruments (id) {
        id -> Int4,
        symbol -> Text,
    }
}

diesel::table! {
    market.timeframe_1m (instrument_id, ts) {
        instrument_id -> Int4,
        ts -> Timestamptz,
        open -> Float8,
        high -> Float8,
        low -> Float8,
        close -> Float8,
        volume -> Float8,
    }
}

diesel::allow_tables_to_appear_in_same_query!(instruments, timeframe_1m);
