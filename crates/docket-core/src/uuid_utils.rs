//! UUIDv7 helpers.
//!
//! Every row id in docket is a UUIDv7, so ids sort by creation time and the
//! queue can break `created_at` ties by id.

use uuid::Uuid;

/// Generate a new UUIDv7 identifier.
#[inline]
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}

/// Check if a UUID is version 7.
#[inline]
pub fn is_v7(uuid: &Uuid) -> bool {
    uuid.get_version_num() == 7
}
