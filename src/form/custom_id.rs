use crate::domain::{CustomIdPolicy, EntityStatus, EnumValues};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomIdState {
    NoIdRequired,
    IdRequiredUnset,
    IdRequiredSet(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CustomIdError {
    #[error("an id is required")]
    Empty,
    #[error("'{0}' is not one of the allowed ids")]
    NotAllowed(String),
    #[error("this entity does not take a custom id")]
    NotRequired,
}

/// Tracks the user-chosen id of a new entity whose schema asks for one.
#[derive(Debug, Clone)]
pub struct CustomIdAssigner {
    policy: CustomIdPolicy,
    state: CustomIdState,
    missing_flag: bool,
}

impl CustomIdAssigner {
    pub fn new(policy: &CustomIdPolicy, status: EntityStatus) -> Self {
        let state = if status == EntityStatus::New && policy.is_required() {
            CustomIdState::IdRequiredUnset
        } else {
            CustomIdState::NoIdRequired
        };
        Self {
            policy: policy.clone(),
            state,
            missing_flag: false,
        }
    }

    /// Assigns a trimmed id. A rejected id leaves the state unset.
    pub fn assign(&mut self, id: &str) -> Result<(), CustomIdError> {
        if self.state == CustomIdState::NoIdRequired {
            return Err(CustomIdError::NotRequired);
        }
        let id = id.trim();
        if id.is_empty() {
            self.state = CustomIdState::IdRequiredUnset;
            return Err(CustomIdError::Empty);
        }
        if !self.policy.allows(id) {
            self.state = CustomIdState::IdRequiredUnset;
            return Err(CustomIdError::NotAllowed(id.to_string()));
        }
        self.state = CustomIdState::IdRequiredSet(id.to_string());
        self.missing_flag = false;
        Ok(())
    }

    pub fn state(&self) -> &CustomIdState {
        &self.state
    }

    pub fn id(&self) -> Option<&str> {
        match &self.state {
            CustomIdState::IdRequiredSet(id) => Some(id),
            _ => None,
        }
    }

    /// Submission may proceed.
    pub fn is_ready(&self) -> bool {
        !matches!(self.state, CustomIdState::IdRequiredUnset)
    }

    /// Allowed ids with labels, when the schema enumerates them.
    pub fn options(&self) -> Option<&EnumValues> {
        self.policy.options()
    }

    /// Set when a submit was blocked for lack of an id.
    pub fn has_error(&self) -> bool {
        self.missing_flag
    }

    pub(crate) fn flag_missing(&mut self) {
        self.missing_flag = true;
    }

    /// Once saved, the entity exists and its id is fixed.
    pub(crate) fn settle(&mut self) {
        self.state = CustomIdState::NoIdRequired;
        self.missing_flag = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn existing_entities_never_need_an_id() {
        let assigner = CustomIdAssigner::new(&CustomIdPolicy::Flag(true), EntityStatus::Existing);
        assert_eq!(assigner.state(), &CustomIdState::NoIdRequired);
        assert!(assigner.is_ready());
    }

    #[test]
    fn blank_ids_are_rejected() {
        let mut assigner = CustomIdAssigner::new(&CustomIdPolicy::Flag(true), EntityStatus::New);
        assert_eq!(assigner.assign("   "), Err(CustomIdError::Empty));
        assert_eq!(assigner.state(), &CustomIdState::IdRequiredUnset);
        assert!(!assigner.is_ready());

        assigner.assign(" lamp-01 ").expect("id accepted");
        assert_eq!(assigner.id(), Some("lamp-01"));
    }

    #[test]
    fn enumerated_policy_restricts_ids() {
        let policy = CustomIdPolicy::Enumerated(
            [("es".to_string(), "Spanish".to_string())].into_iter().collect(),
        );
        let mut assigner = CustomIdAssigner::new(&policy, EntityStatus::New);
        assert_eq!(
            assigner.assign("fr"),
            Err(CustomIdError::NotAllowed("fr".into()))
        );
        assert!(assigner.assign("es").is_ok());
        assert_eq!(assigner.options().map(|options| options.len()), Some(1));
    }

    #[test]
    fn schemas_without_custom_ids_refuse_assignment() {
        let mut assigner = CustomIdAssigner::new(&CustomIdPolicy::default(), EntityStatus::New);
        assert_eq!(assigner.assign("x"), Err(CustomIdError::NotRequired));
    }
}
