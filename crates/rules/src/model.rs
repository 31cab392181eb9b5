use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A migration rule as authored in YAML.
///
/// Rules are immutable once loaded. The only value the engine attaches is the backend command
/// (`ls_cmd`), and it does so on a copy via [`Rule::with_command`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(rename = "ruleID")]
    pub rule_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub effort: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Value>,
    #[serde(
        rename = "customVariables",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub custom_variables: Vec<Value>,
    #[serde(rename = "lsCmd", default, skip_serializing_if = "Option::is_none")]
    pub ls_cmd: Option<String>,
    pub when: When,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instructions: Vec<Value>,
}

fn is_zero(value: &i32) -> bool {
    *value == 0
}

impl Rule {
    /// Returns a copy of the rule bound to `command`. The receiver is left untouched, so the same
    /// loaded rule can be bound to different backend commands side by side.
    pub fn with_command(&self, command: impl Into<String>) -> Rule {
        Rule {
            ls_cmd: Some(command.into()),
            ..self.clone()
        }
    }
}

/// The `when` clause: exactly one of a single leaf, an `or` list or an `and` list.
///
/// Decoding rejects a node that carries none or more than one of the three shapes, so an
/// "empty" `when` cannot be represented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawWhen", into = "RawWhen")]
pub enum When {
    Single(JavaReferenced),
    Any(Vec<Condition>),
    All(Vec<Condition>),
}

impl When {
    pub fn shape(&self) -> &'static str {
        match self {
            When::Single(_) => "single",
            When::Any(_) => "or",
            When::All(_) => "and",
        }
    }

    /// Leaf queries in declaration order. Conditions without a `java.referenced` leaf (dependency
    /// checks) contribute nothing here.
    pub fn referenced_leaves(&self) -> Vec<&JavaReferenced> {
        match self {
            When::Single(leaf) => vec![leaf],
            When::Any(conditions) | When::All(conditions) => conditions
                .iter()
                .filter_map(|c| c.java_referenced.as_ref())
                .collect(),
        }
    }

    pub fn conditions(&self) -> &[Condition] {
        match self {
            When::Single(_) => &[],
            When::Any(conditions) | When::All(conditions) => conditions,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawWhen {
    #[serde(
        rename = "java.referenced",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    java_referenced: Option<JavaReferenced>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    or: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    and: Vec<Condition>,
}

impl TryFrom<RawWhen> for When {
    type Error = String;

    fn try_from(raw: RawWhen) -> Result<Self, Self::Error> {
        match (raw.java_referenced, raw.or.is_empty(), raw.and.is_empty()) {
            (Some(leaf), true, true) => Ok(When::Single(leaf)),
            (None, false, true) => Ok(When::Any(raw.or)),
            (None, true, false) => Ok(When::All(raw.and)),
            (None, true, true) => Err(
                "`when` must contain one of `java.referenced`, `or` or `and`".to_string(),
            ),
            _ => Err(
                "`when` must contain exactly one of `java.referenced`, `or` or `and`".to_string(),
            ),
        }
    }
}

impl From<When> for RawWhen {
    fn from(value: When) -> Self {
        match value {
            When::Single(leaf) => RawWhen {
                java_referenced: Some(leaf),
                ..RawWhen::default()
            },
            When::Any(or) => RawWhen {
                or,
                ..RawWhen::default()
            },
            When::All(and) => RawWhen {
                and,
                ..RawWhen::default()
            },
        }
    }
}

/// One entry of an `or`/`and` list: exactly one of a `java.referenced` or a `java.dependency`
/// leaf, plus optional modifiers.
///
/// `java.dependency` and the `as`/`from`/`not`/`ignore` modifiers are decoded and carried through
/// to reports, but the search engine does not evaluate them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCondition")]
pub struct Condition {
    #[serde(rename = "java.referenced", skip_serializing_if = "Option::is_none")]
    pub java_referenced: Option<JavaReferenced>,
    #[serde(rename = "java.dependency", skip_serializing_if = "Option::is_none")]
    pub java_dependency: Option<JavaDependency>,
    #[serde(rename = "as", skip_serializing_if = "Option::is_none")]
    pub as_: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore: Option<String>,
}

#[derive(Deserialize)]
struct RawCondition {
    #[serde(rename = "java.referenced", default)]
    java_referenced: Option<JavaReferenced>,
    #[serde(rename = "java.dependency", default)]
    java_dependency: Option<JavaDependency>,
    #[serde(rename = "as", default, deserialize_with = "scalar_string")]
    as_: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    from: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    not: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    ignore: Option<String>,
}

impl TryFrom<RawCondition> for Condition {
    type Error = String;

    fn try_from(raw: RawCondition) -> Result<Self, Self::Error> {
        match (&raw.java_referenced, &raw.java_dependency) {
            (None, None) => Err(
                "condition must contain one of `java.referenced` or `java.dependency`".to_string(),
            ),
            (Some(_), Some(_)) => Err(
                "condition must contain exactly one of `java.referenced` or `java.dependency`"
                    .to_string(),
            ),
            _ => Ok(Condition {
                java_referenced: raw.java_referenced,
                java_dependency: raw.java_dependency,
                as_: raw.as_,
                from: raw.from,
                not: raw.not,
                ignore: raw.ignore,
            }),
        }
    }
}

impl Condition {
    /// Names of the modifiers present on this condition.
    pub fn modifiers(&self) -> Vec<&'static str> {
        [
            ("as", self.as_.is_some()),
            ("from", self.from.is_some()),
            ("not", self.not.is_some()),
            ("ignore", self.ignore.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, present)| present.then_some(name))
        .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JavaReferenced {
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub pattern: String,
    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub filepaths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotated: Option<Annotated>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Annotated {
    Pattern(String),
    Detailed {
        #[serde(default)]
        pattern: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        elements: Vec<AnnotatedElement>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedElement {
    pub name: String,
    #[serde(default, deserialize_with = "scalar_string")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JavaDependency {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lowerbound: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upperbound: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nameregex: Option<String>,
}

// Modifiers are free-form in rule files (`not: true`, `ignore: yes`, `as: dep`); keep the text.
fn scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) if s.trim().is_empty() => Vec::new(),
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(items)) => items,
    })
}
