//! Per-plugin instance lifecycle state machine (spec §4.3):
//!
//! ```text
//! Unloaded -> Loaded -> Described -> Instantiated -> Active -> Destroyed
//!                ^           |            |             |
//!                └───────────┴────────────┴─────────────┘  (errors -> Unloaded)
//! ```

use crate::foundation::error::{ToucanError, ToucanResult};
use crate::plugin_host::abi::actions;
use crate::property_set::PropertySet;

/// A plugin (or plugin instance)'s lifecycle state (spec §4.3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PluginState {
    /// No library loaded yet.
    Unloaded,
    /// Library loaded; not yet described.
    Loaded,
    /// Capability property set filled.
    Described,
    /// An opaque instance handle has been created.
    Instantiated,
    /// The instance has rendered at least one frame.
    Active,
    /// The instance has been torn down and must not be reused.
    Destroyed,
}

impl PluginState {
    /// `true` iff `action` is a legal transition out of this state (spec
    /// §4.3 diagram).
    pub fn accepts(self, action: &str) -> bool {
        matches!(
            (self, action),
            (PluginState::Unloaded, actions::LOAD)
                | (PluginState::Loaded, actions::DESCRIBE)
                | (PluginState::Described, actions::CREATE_INSTANCE)
                | (PluginState::Instantiated, actions::RENDER)
                | (PluginState::Active, actions::RENDER)
                | (PluginState::Instantiated, actions::DESTROY_INSTANCE)
                | (PluginState::Active, actions::DESTROY_INSTANCE)
                | (PluginState::Described, actions::UNLOAD)
        )
    }

    /// The state reached after `action` succeeds from this state. Callers
    /// must check [`PluginState::accepts`] first.
    pub fn advance(self, action: &str) -> PluginState {
        match action {
            actions::LOAD => PluginState::Loaded,
            actions::DESCRIBE => PluginState::Described,
            actions::CREATE_INSTANCE => PluginState::Instantiated,
            actions::RENDER => PluginState::Active,
            actions::DESTROY_INSTANCE => PluginState::Described,
            actions::UNLOAD => PluginState::Unloaded,
            _ => self,
        }
    }
}

/// A created plugin instance: an opaque handle plus the property set used
/// to exchange values with it (spec §3 "Plugin instance").
#[derive(Debug)]
pub struct PluginInstance {
    /// Identifier of the owning plugin.
    pub plugin_id: String,
    /// Opaque handle the plugin's `CreateInstance` action produced.
    pub handle: usize,
    /// Instance-scoped property set (parameters, `Source`/`Output`, ...).
    pub properties: PropertySet,
    /// Current lifecycle state.
    pub state: PluginState,
}

impl PluginInstance {
    /// Transition `self.state` by `action`, failing with
    /// [`ToucanError::PluginError`] (mapped by the caller from a non-zero
    /// dispatch status) on an illegal transition.
    pub fn checked_advance(&mut self, action: &str) -> ToucanResult<()> {
        if !self.state.accepts(action) {
            return Err(ToucanError::plugin_error(action, -1));
        }
        self.state = self.state.advance(action);
        Ok(())
    }
}
