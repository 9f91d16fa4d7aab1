// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Request filtering for navigating pages

mod blocklist;
mod filter;

pub use blocklist::{Blocklist, DEFAULT_BLOCKLIST};
pub use filter::{AbortReason, FilterVerdict, RequestEvent, RequestFilter, ResourceType};

pub(crate) use filter::truncate;
