// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Browser engine control: lifecycle, sessions and guarded navigation

mod host;
mod navigate;
mod session;

pub use host::BrowserHost;
pub use navigate::{open_session, preflight, NavigationSpec};
pub use session::{Session, SessionState};
