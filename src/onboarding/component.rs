use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::onboarding::projection::FormData;
use crate::users::dto::UpdateUserRequest;

/// Optional profile-field group an admin can place on a configurable page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Component {
    AboutMe,
    Address,
    Birthdate,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown component '{0}', expected one of aboutMe, address, birthdate")]
pub struct UnknownComponent(pub String);

impl Component {
    pub const ALL: [Component; 3] = [Component::AboutMe, Component::Address, Component::Birthdate];

    pub fn as_str(self) -> &'static str {
        match self {
            Component::AboutMe => "aboutMe",
            Component::Address => "address",
            Component::Birthdate => "birthdate",
        }
    }

    pub fn spec(self) -> &'static ComponentSpec {
        match self {
            Component::AboutMe => &COMPONENTS[0],
            Component::Address => &COMPONENTS[1],
            Component::Birthdate => &COMPONENTS[2],
        }
    }

    pub fn label(self) -> &'static str {
        self.spec().label
    }

    pub fn fields(self) -> &'static [ProfileField] {
        self.spec().fields
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Component {
    type Err = UnknownComponent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Component::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownComponent(s.to_string()))
    }
}

/// A user-profile form field owned by exactly one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileField {
    AboutMe,
    Street,
    City,
    State,
    Zip,
    Birthdate,
}

impl ProfileField {
    pub fn name(self) -> &'static str {
        match self {
            ProfileField::AboutMe => "aboutMe",
            ProfileField::Street => "street",
            ProfileField::City => "city",
            ProfileField::State => "state",
            ProfileField::Zip => "zip",
            ProfileField::Birthdate => "birthdate",
        }
    }

    pub fn read(self, form: &FormData) -> &str {
        match self {
            ProfileField::AboutMe => &form.about_me,
            ProfileField::Street => &form.street,
            ProfileField::City => &form.city,
            ProfileField::State => &form.state,
            ProfileField::Zip => &form.zip,
            ProfileField::Birthdate => &form.birthdate,
        }
    }

    pub fn write(self, patch: &mut UpdateUserRequest, value: String) {
        let slot = match self {
            ProfileField::AboutMe => &mut patch.about_me,
            ProfileField::Street => &mut patch.street,
            ProfileField::City => &mut patch.city,
            ProfileField::State => &mut patch.state,
            ProfileField::Zip => &mut patch.zip,
            ProfileField::Birthdate => &mut patch.birthdate,
        };
        *slot = Some(value);
    }
}

/// Table row: which fields a component owns and when its group is sent.
pub struct ComponentSpec {
    pub component: Component,
    pub label: &'static str,
    pub fields: &'static [ProfileField],
    /// Receives the current values of `fields`, in order.
    pub include: fn(&[&str]) -> bool,
}

fn any_non_empty(values: &[&str]) -> bool {
    values.iter().any(|v| !v.is_empty())
}

pub static COMPONENTS: [ComponentSpec; 3] = [
    ComponentSpec {
        component: Component::AboutMe,
        label: "About Me",
        fields: &[ProfileField::AboutMe],
        include: any_non_empty,
    },
    ComponentSpec {
        component: Component::Address,
        label: "Address",
        fields: &[
            ProfileField::Street,
            ProfileField::City,
            ProfileField::State,
            ProfileField::Zip,
        ],
        include: any_non_empty,
    },
    ComponentSpec {
        component: Component::Birthdate,
        label: "Birth Date",
        fields: &[ProfileField::Birthdate],
        include: any_non_empty,
    },
];

/// One of the two admin-configurable wizard pages. Page 1 is always account
/// creation and never appears here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub enum Page {
    Two,
    Three,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("page must be 2 or 3, got {0}")]
pub struct InvalidPage(pub i64);

impl Page {
    pub const CONFIGURABLE: [Page; 2] = [Page::Two, Page::Three];

    pub fn number(self) -> i16 {
        match self {
            Page::Two => 2,
            Page::Three => 3,
        }
    }

    pub fn other(self) -> Page {
        match self {
            Page::Two => Page::Three,
            Page::Three => Page::Two,
        }
    }

    pub fn from_number(n: i64) -> Result<Self, InvalidPage> {
        match n {
            2 => Ok(Page::Two),
            3 => Ok(Page::Three),
            other => Err(InvalidPage(other)),
        }
    }
}

impl TryFrom<i16> for Page {
    type Error = InvalidPage;

    fn try_from(n: i16) -> Result<Self, Self::Error> {
        Page::from_number(n.into())
    }
}

impl From<Page> for i16 {
    fn from(p: Page) -> Self {
        p.number()
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}
