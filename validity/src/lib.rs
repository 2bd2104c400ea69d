//! Form-field validation state machine
//!
//! Fields run named validators (sync or async) against their current value,
//! track interaction state (dirty, touched, modified), and publish results to
//! subscribers. Groups aggregate fields and other groups.

pub mod builtins;
pub mod classes;
pub mod config;
pub mod error;
pub mod executor;
pub mod field;
pub mod group;
pub mod interaction;
pub mod observer;
pub mod progress;
pub mod registry;
pub mod result;
pub mod rules;
pub mod validation;

pub use config::{ValidationContext, ValidityConfig};
pub use error::{ConfigError, ExecutionError, Rejection};
pub use field::Validity;
pub use group::ValidityGroup;
pub use validation::Validation;

pub mod prelude {
    pub use crate::classes::{ClassNames, ClassOverrides};
    pub use crate::config::{ValidationContext, ValidityConfig};
    pub use crate::error::{ConfigError, ExecutionError, Rejection};
    pub use crate::field::Validity;
    pub use crate::group::{ChildResult, GroupResult, ResultSource, ValidityGroup};
    pub use crate::observer::{SubscriptionId, ValidityEvent};
    pub use crate::progress::{Progress, ProgressMap};
    pub use crate::registry::{CheckReturn, MessageSource, ValidatorDefinition, ValidatorRegistry};
    pub use crate::result::{Flags, ValidationError, ValidationResult, ValidatorResult};
    pub use crate::rules::{RuleSpec, ValidatorRef};
    pub use crate::validation::Validation;
}
