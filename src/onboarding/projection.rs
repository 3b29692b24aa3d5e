use serde::{Deserialize, Serialize};

use crate::onboarding::component::Component;
use crate::users::dto::UpdateUserRequest;

/// Everything typed into the wizard so far. Never cleared between steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormData {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub about_me: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub birthdate: String,
}

/// Build the update for a page: for each component, its whole field group is
/// sent when the group's predicate accepts the current values. Fields owned by
/// components not on the page are never included.
pub fn project(components: &[Component], form: &FormData) -> UpdateUserRequest {
    let mut patch = UpdateUserRequest::default();
    for component in components {
        let spec = component.spec();
        let values: Vec<&str> = spec.fields.iter().map(|f| f.read(form)).collect();
        if !(spec.include)(&values) {
            continue;
        }
        for (field, value) in spec.fields.iter().zip(values) {
            field.write(&mut patch, value.to_string());
        }
    }
    patch
}
