//! Aggregation pipeline shapes used by the services

use crate::models::PUBLIC_ID_FIELD;
use crate::store::filter::Filter;
use crate::store::pipeline::Stage;
use crate::store::{Collection, ID_FIELD};

/// Copies the stored primary key into the public `id` field
pub fn expose_id() -> Stage {
    Stage::copy_field(PUBLIC_ID_FIELD, ID_FIELD)
}

/// Projects matching `filter` with their members joined from `users`
///
/// Member ids are joined against the users' primary key. A project without
/// members gets an empty `members` array.
pub fn project_details(filter: Filter) -> Vec<Stage> {
    vec![
        Stage::Match(filter),
        Stage::lookup(Collection::Users, "memberIds", ID_FIELD, "members"),
        expose_id(),
    ]
}

/// Documents matching `filter`, with `id` exposed
pub fn public_listing(filter: Filter) -> Vec<Stage> {
    vec![Stage::Match(filter), expose_id()]
}

/// Whole-collection dump
pub fn dump() -> Vec<Stage> {
    public_listing(Filter::All)
}
