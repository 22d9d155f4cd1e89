// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules. Each function takes `&Database` and runs one closure on
//! the connection thread.

pub mod commands;
pub mod library;
