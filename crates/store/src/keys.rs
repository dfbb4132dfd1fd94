//! Well-known store keys. The `habit.*` names are versioned and must stay
//! stable across releases so existing data keeps loading.

pub const HABITS: &str = "habit.habits.v2";
pub const LOGS: &str = "habit.logs.v2";
pub const NEG_LOGS: &str = "habit.logs.negative.v2";
pub const NOTES: &str = "habit.notes.v1";
pub const PENDING: &str = "habit.pending.v2";
pub const TIMEFRAME: &str = "habit.timeframe.v1";

/// Written by the auth module; this crate only reads them.
pub const AUTH_TOKEN: &str = "pb_token";
pub const AUTH_USER: &str = "pb_user";
