#![forbid(unsafe_code)]

//! Per-surface overlay visibility state machine.
//!
//! ```text
//!            focus                 appear delay, still focused
//!  Hidden ──────────▶ Appearing ─────────────────────────────▶ Visible
//!    ▲                    │ delay elapsed, focus gone                │ blur (debounced)
//!    │                    │ or suppressed                            │ or suppression
//!    │                    ▼                                          ▼
//!    └──────────── (released) ◀──────── fade delay ─────────── FadingOut
//!                                                                  │ focus
//!                                                                  └──▶ Visible
//! ```
//!
//! `Hidden` is represented by the absence of a registry entry: an overlay
//! node exists exactly while its surface is `Appearing`, `Visible` or
//! `FadingOut`.
//!
//! Every transition bumps the surface's generation in the registry. Timers
//! capture the generation they were scheduled under, and a timer whose
//! generation is no longer current does nothing. Timers also re-read the
//! live focus and suppression state when they fire instead of trusting
//! what was true when they were scheduled.

use core::time::Duration;

use crate::host::Host;
use crate::position::{Placement, Positioner};
use crate::registry::OverlayRegistry;
use crate::timer::{TimerKind, TimerQueue};

/// Visibility phase of one overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// No overlay node exists.
    #[default]
    Hidden,
    /// Mounted but transparent, waiting out the appearance delay.
    Appearing,
    /// Shown.
    Visible,
    /// Transparent, waiting out the fade delay before removal.
    FadingOut,
}

impl Visibility {
    /// Phases in which the overlay tracks its surface's position.
    #[must_use]
    pub const fn follows_layout(self) -> bool {
        matches!(self, Self::Appearing | Self::Visible)
    }
}

/// Delays driving the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityDelays {
    /// Focus must persist this long before the overlay shows.
    pub appear: Duration,
    /// Blur must persist this long before the overlay starts fading.
    pub blur_debounce: Duration,
    /// Time between fade start and node removal.
    pub fade: Duration,
    /// Delay before a closed modal hands the overlay back.
    pub restore: Duration,
}

impl Default for VisibilityDelays {
    fn default() -> Self {
        Self {
            appear: Duration::from_millis(100),
            blur_debounce: Duration::from_millis(100),
            fade: Duration::from_millis(200),
            restore: Duration::from_millis(100),
        }
    }
}

/// Mutable engine pieces the coordinator drives.
pub(crate) struct Stage<'a, H: Host> {
    pub host: &'a mut H,
    pub registry: &'a mut OverlayRegistry<H::Node>,
    pub timers: &'a mut TimerQueue<H::Node>,
    pub positioner: Positioner,
}

impl<H: Host> Stage<'_, H> {
    /// Reposition the surface's overlay, releasing it if the surface is gone.
    /// Returns whether the overlay is still registered.
    fn reposition_or_release(&mut self, surface: &H::Node) -> bool {
        let Some(handle) = self.registry.get_mut(surface) else {
            return false;
        };
        match self.positioner.reposition(self.host, handle) {
            Placement::Detached => {
                self.registry.release(self.host, surface);
                false
            }
            Placement::Moved(_) | Placement::Unchanged(_) => true,
        }
    }
}

/// Focus tracking, suppression and per-surface transitions.
#[derive(Debug)]
pub struct VisibilityCoordinator<N> {
    delays: VisibilityDelays,
    suppressed: bool,
    /// Surface that currently holds focus, cleared on its blur.
    focused: Option<N>,
    /// Surface that most recently gained focus; survives blur.
    last_focused: Option<N>,
}

impl<N> VisibilityCoordinator<N>
where
    N: Clone + Eq + core::hash::Hash + core::fmt::Debug,
{
    #[must_use]
    pub fn new(delays: VisibilityDelays) -> Self {
        Self {
            delays,
            suppressed: false,
            focused: None,
            last_focused: None,
        }
    }

    #[must_use]
    pub fn delays(&self) -> VisibilityDelays {
        self.delays
    }

    #[must_use]
    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    #[must_use]
    pub fn focused(&self) -> Option<&N> {
        self.focused.as_ref()
    }

    #[must_use]
    pub fn last_focused(&self) -> Option<&N> {
        self.last_focused.as_ref()
    }

    /// Drop focus references to a surface that left the document.
    pub fn forget(&mut self, surface: &N) {
        if self.focused.as_ref() == Some(surface) {
            self.focused = None;
        }
        if self.last_focused.as_ref() == Some(surface) {
            self.last_focused = None;
        }
    }

    /// An editable surface gained focus.
    pub(crate) fn on_focus<H>(&mut self, stage: &mut Stage<'_, H>, surface: &N, now: Duration)
    where
        H: Host<Node = N>,
    {
        self.focused = Some(surface.clone());
        self.last_focused = Some(surface.clone());
        if self.suppressed {
            tracing::trace!(surface = ?surface, "focus while suppressed; no overlay");
            return;
        }

        let current = stage.registry.get(surface).map(|h| h.visibility);
        match current {
            None | Some(Visibility::Hidden) => {
                let handle = match stage.registry.acquire(stage.host, surface) {
                    Ok(handle) => handle,
                    Err(err) => {
                        tracing::warn!(surface = ?surface, error = %err, "overlay mount failed");
                        return;
                    }
                };
                handle.visibility = Visibility::Appearing;
                let Some(generation) = stage.registry.bump(surface) else {
                    return;
                };
                if !stage.reposition_or_release(surface) {
                    return;
                }
                stage.timers.schedule(
                    now.saturating_add(self.delays.appear),
                    TimerKind::Appear {
                        surface: surface.clone(),
                        generation,
                    },
                );
                tracing::debug!(surface = ?surface, "overlay appearing");
            }
            // The pending appear timer re-checks focus when it fires.
            Some(Visibility::Appearing) => {}
            Some(Visibility::Visible) => {
                stage.registry.bump(surface);
                stage.reposition_or_release(surface);
            }
            Some(Visibility::FadingOut) => {
                stage.registry.bump(surface);
                if let Some(handle) = stage.registry.get_mut(surface) {
                    handle.visibility = Visibility::Visible;
                    stage.host.set_overlay_shown(handle.id, true);
                }
                stage.reposition_or_release(surface);
                tracing::debug!(surface = ?surface, "fade cancelled by refocus");
            }
        }
    }

    /// A surface lost focus.
    pub(crate) fn on_blur<H>(&mut self, stage: &mut Stage<'_, H>, surface: &N, now: Duration)
    where
        H: Host<Node = N>,
    {
        if self.focused.as_ref() == Some(surface) {
            self.focused = None;
        }
        let visible = stage
            .registry
            .get(surface)
            .is_some_and(|h| h.visibility == Visibility::Visible);
        if !visible {
            return;
        }
        if let Some(generation) = stage.registry.bump(surface) {
            stage.timers.schedule(
                now.saturating_add(self.delays.blur_debounce),
                TimerKind::BlurSettle {
                    surface: surface.clone(),
                    generation,
                },
            );
        }
    }

    /// Turn global suppression on or off. Turning it on fades every overlay
    /// that is appearing or visible; turning it off restores nothing by
    /// itself.
    pub(crate) fn set_suppressed<H>(&mut self, stage: &mut Stage<'_, H>, suppressed: bool, now: Duration)
    where
        H: Host<Node = N>,
    {
        if self.suppressed == suppressed {
            return;
        }
        self.suppressed = suppressed;
        tracing::debug!(suppressed, "overlay suppression changed");
        if !suppressed {
            return;
        }
        for surface in stage.registry.surfaces() {
            let live = stage
                .registry
                .get(&surface)
                .is_some_and(|h| h.visibility.follows_layout());
            if live {
                self.start_fade(stage, &surface, now);
            }
        }
    }

    /// Appearance delay elapsed.
    pub(crate) fn on_appear<H>(&mut self, stage: &mut Stage<'_, H>, surface: &N, generation: u64)
    where
        H: Host<Node = N>,
    {
        let Some(handle) = stage.registry.get(surface) else {
            return;
        };
        if handle.generation != generation || handle.visibility != Visibility::Appearing {
            return;
        }
        let still_wanted = !self.suppressed && self.focused.as_ref() == Some(surface);
        if !still_wanted {
            stage.registry.release(stage.host, surface);
            tracing::debug!(surface = ?surface, "appearance abandoned");
            return;
        }
        if !stage.reposition_or_release(surface) {
            self.forget(surface);
            return;
        }
        if let Some(handle) = stage.registry.get_mut(surface) {
            handle.visibility = Visibility::Visible;
            stage.host.set_overlay_shown(handle.id, true);
            tracing::debug!(surface = ?surface, "overlay visible");
        }
    }

    /// Blur debounce elapsed.
    pub(crate) fn on_blur_settle<H>(
        &mut self,
        stage: &mut Stage<'_, H>,
        surface: &N,
        generation: u64,
        now: Duration,
    ) where
        H: Host<Node = N>,
    {
        let current = stage
            .registry
            .get(surface)
            .is_some_and(|h| h.generation == generation && h.visibility == Visibility::Visible);
        if current && self.focused.as_ref() != Some(surface) {
            self.start_fade(stage, surface, now);
        }
    }

    /// Fade delay elapsed.
    pub(crate) fn on_fade_complete<H>(&mut self, stage: &mut Stage<'_, H>, surface: &N, generation: u64)
    where
        H: Host<Node = N>,
    {
        let current = stage
            .registry
            .get(surface)
            .is_some_and(|h| h.generation == generation && h.visibility == Visibility::FadingOut);
        if current {
            stage.registry.release(stage.host, surface);
        }
    }

    /// Return the overlay of `surface` straight to `Visible` after the modal
    /// closed. Only the last-focused, still-attached surface qualifies. A
    /// surface that lost focus while the modal was open gets the usual blur
    /// debounce, so its overlay fades unless focus comes back.
    pub(crate) fn restore<H>(&mut self, stage: &mut Stage<'_, H>, surface: &N, now: Duration) -> bool
    where
        H: Host<Node = N>,
    {
        if self.suppressed || self.last_focused.as_ref() != Some(surface) {
            return false;
        }
        if !stage.host.is_attached(surface) {
            stage.registry.release(stage.host, surface);
            self.forget(surface);
            return false;
        }
        if let Err(err) = stage.registry.acquire(stage.host, surface) {
            tracing::warn!(surface = ?surface, error = %err, "overlay restore failed");
            return false;
        }
        let Some(generation) = stage.registry.bump(surface) else {
            return false;
        };
        if !stage.reposition_or_release(surface) {
            self.forget(surface);
            return false;
        }
        if let Some(handle) = stage.registry.get_mut(surface) {
            handle.visibility = Visibility::Visible;
            stage.host.set_overlay_shown(handle.id, true);
        }
        if self.focused.as_ref() != Some(surface) {
            stage.timers.schedule(
                now.saturating_add(self.delays.blur_debounce),
                TimerKind::BlurSettle {
                    surface: surface.clone(),
                    generation,
                },
            );
        }
        tracing::debug!(surface = ?surface, "overlay restored after modal close");
        true
    }

    /// Reposition every overlay that tracks layout, releasing the ones whose
    /// surface is gone or no longer editable.
    pub(crate) fn reposition_all<H>(&mut self, stage: &mut Stage<'_, H>) -> usize
    where
        H: Host<Node = N>,
    {
        let mut released = 0;
        for surface in stage.registry.surfaces() {
            let follows = stage
                .registry
                .get(&surface)
                .is_some_and(|h| h.visibility.follows_layout());
            if !follows {
                continue;
            }
            let editable = stage
                .host
                .traits(&surface)
                .is_some_and(|t| crate::classify::is_editable_surface(&t));
            if !editable {
                stage.registry.release(stage.host, &surface);
                released += 1;
                continue;
            }
            if !stage.reposition_or_release(&surface) {
                self.forget(&surface);
                released += 1;
            }
        }
        released
    }

    fn start_fade<H>(&mut self, stage: &mut Stage<'_, H>, surface: &N, now: Duration)
    where
        H: Host<Node = N>,
    {
        let Some(handle) = stage.registry.get_mut(surface) else {
            return;
        };
        handle.visibility = Visibility::FadingOut;
        stage.host.set_overlay_shown(handle.id, false);
        if let Some(generation) = stage.registry.bump(surface) {
            stage.timers.schedule(
                now.saturating_add(self.delays.fade),
                TimerKind::FadeComplete {
                    surface: surface.clone(),
                    generation,
                },
            );
        }
        tracing::debug!(surface = ?surface, "overlay fading");
    }
}
