// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Namespace binding: decisions, backend orchestration and the reconciler loop.

pub mod binder;
pub mod decision;
pub mod events;
pub mod manager;
pub mod orchestrator;
pub mod pending;

pub use binder::KubeBinder;
pub use events::{ReconcileEvent, ResourceEvent};
pub use manager::{NamespaceBinder, Reconciler, ReconcilerHandle};
pub use orchestrator::{BindInfo, BindingOrchestrator, StepReport};
pub use pending::PendingBinds;
