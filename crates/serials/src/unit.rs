use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use serialtrack_core::{DomainError, DomainResult, Entity, ProductId, SerialId};

use crate::{SerialCode, SerialState};

/// One individually tracked physical unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialUnit {
    pub id: SerialId,
    pub product_id: ProductId,
    pub code: SerialCode,
    pub state: SerialState,
    pub registered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl Entity for SerialUnit {
    const KIND: &'static str = "serial";
    type Id = SerialId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl SerialUnit {
    /// A freshly registered unit.
    pub fn register(
        id: SerialId,
        product_id: ProductId,
        code: SerialCode,
        state: SerialState,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            product_id,
            code,
            state,
            registered_at: at,
            updated_at: at,
            notes: None,
        }
    }

    /// Move the unit to `cmd.state`, replacing its notes and stamping `updated_at`.
    ///
    /// Returns the history entry describing the change.
    pub fn apply_transition(&mut self, cmd: &TransitionSerial) -> DomainResult<SerialHistoryEntry> {
        if cmd.serial_id != self.id {
            return Err(DomainError::invalid_id("serial_id mismatch"));
        }
        if !self.state.can_transition_to(cmd.state) {
            return Err(DomainError::validation(format!(
                "cannot move serial from {} to {}",
                self.state, cmd.state
            )));
        }

        let entry = SerialHistoryEntry {
            serial_id: self.id,
            from_state: Some(self.state),
            to_state: cmd.state,
            notes: cmd.normalized_notes(),
            occurred_at: cmd.occurred_at,
        };

        self.state = cmd.state;
        self.notes = entry.notes.clone();
        self.updated_at = cmd.occurred_at;
        Ok(entry)
    }

    /// Listing order: lifecycle state, then code.
    pub fn sort_for_listing(units: &mut [SerialUnit]) {
        units.sort_by(|a, b| a.state.cmp(&b.state).then_with(|| a.code.cmp(&b.code)));
    }
}

/// One entry of a unit's history trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialHistoryEntry {
    pub serial_id: SerialId,
    /// `None` for the registration entry.
    pub from_state: Option<SerialState>,
    pub to_state: SerialState,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl SerialHistoryEntry {
    pub fn registered(unit: &SerialUnit) -> Self {
        Self {
            serial_id: unit.id,
            from_state: None,
            to_state: unit.state,
            notes: None,
            occurred_at: unit.registered_at,
        }
    }
}

/// Command: RegisterSerial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterSerial {
    pub product_id: ProductId,
    pub code: String,
    pub occurred_at: DateTime<Utc>,
}

impl RegisterSerial {
    pub fn into_unit(self, id: SerialId) -> DomainResult<SerialUnit> {
        let code = SerialCode::parse(&self.code)?;
        Ok(SerialUnit::register(
            id,
            self.product_id,
            code,
            SerialState::InStock,
            self.occurred_at,
        ))
    }
}

/// Command: TransitionSerial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionSerial {
    pub serial_id: SerialId,
    pub state: SerialState,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl TransitionSerial {
    fn normalized_notes(&self) -> Option<String> {
        self.notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
    }
}
