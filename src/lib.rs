// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
pub mod config;
pub mod constants;
pub mod error;
pub mod logger;
pub mod meltdown;
pub mod names;
pub mod podref;
pub mod versioned_secret;

#[cfg(test)]
mod test_utils;
