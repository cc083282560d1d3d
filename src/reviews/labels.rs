//! The fixed complaint label set used to classify player reviews.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub struct Label {
    pub key: &'static str,
    pub description: &'static str,
}

pub struct LabelGroup {
    pub key: &'static str,
    pub labels: &'static [Label],
}

pub const CATEGORIES: &[LabelGroup] = &[
    LabelGroup {
        key: "learning_curve_and_complexity",
        labels: &[
            Label {
                key: "learning_champions",
                description: "Learning abilities and mechanics for 160+ champions",
            },
            Label {
                key: "understanding_systems",
                description: "Understanding complex game systems (items, runes, macro strategy)",
            },
            Label {
                key: "steep_curve",
                description: "The steep learning curve that takes months to even grasp basics",
            },
            Label {
                key: "bad_tutorial",
                description: "No adequate tutorial system to teach essential concepts",
            },
            Label {
                key: "mechanics_difficult",
                description: "Difficulty with basic mechanics like last-hitting minions",
            },
        ],
    },
    LabelGroup {
        key: "hostile_community_environment",
        labels: &[
            Label {
                key: "flamed_for_mistakes",
                description: "Players are 'flamed' and insulted for making mistakes",
            },
            Label {
                key: "toxic_teammates",
                description: "Toxic behavior from teammates who expect perfection immediately",
            },
        ],
    },
    LabelGroup {
        key: "matchmaking_issues",
        labels: &[
            Label {
                key: "smurfs",
                description: "New players often encounter smurfs (experienced players on new accounts) who dominate matches",
            },
            Label {
                key: "unfair_matchmaking",
                description: "New players matched against much more experienced opponents",
            },
            Label {
                key: "long_queue",
                description: "Long queue times that can discourage continued play",
            },
            Label {
                key: "long_matches",
                description: "Individual matches lasting 30-45+ minutes",
            },
        ],
    },
    LabelGroup {
        key: "time_investment_requirements",
        labels: &[Label {
            key: "slow_progress",
            description: "Difficulty progressing without substantial time investment",
        }],
    },
    LabelGroup {
        key: "technical_and_interface_issues",
        labels: &[
            Label {
                key: "bad_ui",
                description: "Unintuitive camera controls and UI elements",
            },
            Label {
                key: "client_bugs",
                description: "Client stability problems and bugs",
            },
        ],
    },
];

/// "matchmaking_issues" -> "Matchmaking Issues"
pub fn group_title(key: &str) -> String {
    key.split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn describe(group: &str, label: &str) -> Option<&'static str> {
    CATEGORIES
        .iter()
        .find(|g| g.key == group)?
        .labels
        .iter()
        .find(|l| l.key == label)
        .map(|l| l.description)
}

/// Boolean flag per label, always covering the full label set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryFlags(BTreeMap<String, BTreeMap<String, bool>>);

impl Default for CategoryFlags {
    fn default() -> Self {
        Self::none()
    }
}

impl CategoryFlags {
    /// Every label set to `false`.
    pub fn none() -> Self {
        let groups = CATEGORIES
            .iter()
            .map(|group| {
                let labels = group
                    .labels
                    .iter()
                    .map(|l| (l.key.to_string(), false))
                    .collect();
                (group.key.to_string(), labels)
            })
            .collect();
        Self(groups)
    }

    /// Build flags from a model reply shaped like
    /// `{"group": {"label": true, ...}, ...}`. Unknown groups and labels are
    /// ignored; anything missing or not a boolean stays `false`.
    pub fn from_json(value: &serde_json::Value) -> Self {
        let mut flags = Self::none();
        let Some(groups) = value.as_object() else {
            return flags;
        };
        for (group, labels) in groups {
            let Some(labels) = labels.as_object() else {
                continue;
            };
            for (label, set) in labels {
                if set.as_bool() == Some(true) {
                    flags.set(group, label, true);
                }
            }
        }
        flags
    }

    pub fn is_set(&self, group: &str, label: &str) -> bool {
        self.0
            .get(group)
            .and_then(|labels| labels.get(label))
            .copied()
            .unwrap_or(false)
    }

    /// Returns `false` when the label is not part of the label set.
    pub fn set(&mut self, group: &str, label: &str, value: bool) -> bool {
        match self.0.get_mut(group).and_then(|labels| labels.get_mut(label)) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// `(group, label)` pairs that are set.
    pub fn set_labels(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().flat_map(|(group, labels)| {
            labels
                .iter()
                .filter(|(_, set)| **set)
                .map(move |(label, _)| (group.as_str(), label.as_str()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn label_set_has_fifteen_labels() {
        let count: usize = CATEGORIES.iter().map(|g| g.labels.len()).sum();
        assert_eq!(CATEGORIES.len(), 5);
        assert_eq!(count, 15);
    }

    #[test]
    fn none_covers_every_label() {
        let flags = CategoryFlags::none();
        for group in CATEGORIES {
            for label in group.labels {
                assert!(!flags.is_set(group.key, label.key));
            }
        }
        assert_eq!(flags.set_labels().count(), 0);
    }

    #[test]
    fn from_json_keeps_known_true_labels_only() {
        let reply = json!({
            "matchmaking_issues": {"smurfs": true, "long_queue": false, "made_up": true},
            "hostile_community_environment": {"toxic_teammates": "yes"},
            "unknown_group": {"anything": true},
            "technical_and_interface_issues": {"client_bugs": true}
        });
        let flags = CategoryFlags::from_json(&reply);

        let set: Vec<_> = flags.set_labels().collect();
        assert_eq!(
            set,
            vec![
                ("matchmaking_issues", "smurfs"),
                ("technical_and_interface_issues", "client_bugs"),
            ]
        );
        assert!(!flags.is_set("unknown_group", "anything"));
    }

    #[test]
    fn from_json_tolerates_non_objects() {
        assert_eq!(CategoryFlags::from_json(&json!([1, 2])), CategoryFlags::none());
        assert_eq!(
            CategoryFlags::from_json(&json!({"matchmaking_issues": true})),
            CategoryFlags::none()
        );
    }

    #[test]
    fn set_rejects_unknown_labels() {
        let mut flags = CategoryFlags::none();
        assert!(flags.set("matchmaking_issues", "smurfs", true));
        assert!(!flags.set("matchmaking_issues", "lag", true));
        assert!(flags.is_set("matchmaking_issues", "smurfs"));
    }

    #[test]
    fn group_title_and_describe() {
        assert_eq!(group_title("learning_curve_and_complexity"), "Learning Curve And Complexity");
        assert_eq!(
            describe("technical_and_interface_issues", "client_bugs"),
            Some("Client stability problems and bugs")
        );
        assert_eq!(describe("technical_and_interface_issues", "nope"), None);
    }
}
