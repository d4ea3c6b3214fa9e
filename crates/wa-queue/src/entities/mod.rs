pub mod incoming_queue;

pub(crate) use sea_orm::entity::prelude::*;
pub(crate) use sea_orm::Set;
pub(crate) use serde::{Deserialize, Serialize};
