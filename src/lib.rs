// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
pub mod backend;
pub mod binding;
pub mod config;
pub mod constants;
pub mod error;
pub mod health;
pub mod kubernetes;
pub mod naming;
pub mod reconcilers;
pub mod retry;

#[cfg(test)]
pub mod test_utils;
