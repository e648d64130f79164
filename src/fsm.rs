//! Generic state-machine driver shell (spec §4.C).
//!
//! Grounded on the teacher's discipline of modeling per-phase data as an
//! enum (`Session::New` / `Session::Authenticated` in
//! `crates/service/src/session/mod.rs`) rather than one struct with
//! always-present fields for every phase. Here the five hooks the spec
//! names are a trait with no-op defaults, so a concrete state only
//! overrides what it actually does.
//!
//! A session does not poll an epoll-style selector directly: each hook is
//! invoked by the owning session task exactly when Tokio readiness (or a
//! completed sub-future) makes the corresponding event available, which is
//! the idiomatic replacement for a raw readiness callback table.
//! `session::drive` is the one real caller of `transition()`: every
//! client-side phase change in that function is driven through here rather
//! than logged ad hoc, so `on_arrival` is where the access-log phase line is
//! emitted.

/// Sentinel markers a driver checks after every transition.
pub trait Terminal {
    fn is_terminal(&self) -> bool;
}

/// One state's behavior. `Ctx` is whatever mutable context the hooks need
/// (typically `&mut Session`); `Next` is the state identifier type returned
/// by each hook.
pub trait State<Ctx> {
    type Next: Terminal;

    fn on_arrival(&mut self, _ctx: &mut Ctx) {}
    fn on_departure(&mut self, _ctx: &mut Ctx) {}

    /// Fires when the owning session's socket reports read readiness while
    /// in this state. No-op by default: most states act only on arrival.
    fn on_read_ready(&mut self, _ctx: &mut Ctx) {}

    /// Fires on write readiness while in this state.
    fn on_write_ready(&mut self, _ctx: &mut Ctx) {}

    /// Fires when a pending sub-future (resolver job, origin connect)
    /// completes while in this state.
    fn on_block_ready(&mut self, _ctx: &mut Ctx) {}
}

/// Drives a single transition: fires `on_departure` on the outgoing state,
/// then `on_arrival` on the incoming one. Never invoked for a same-state
/// "stay" result — callers only call this when the hook actually returned a
/// different state identifier.
pub fn transition<Ctx, Old, New>(ctx: &mut Ctx, mut old: Old, mut new: New) -> New
where
    Old: State<Ctx>,
    New: State<Ctx>,
{
    old.on_departure(ctx);
    new.on_arrival(ctx);
    new
}
