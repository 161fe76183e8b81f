//! Curated remediation suggestions keyed by event code.
//!
//! Lookup order for [`SuggestionBook::get`]:
//!
//! 1. exact match in the custom table, then the built-in table (`high`);
//! 2. the code's leading subsystem token (`PHYSICS` in
//!    `PHYSICS_BODY_EXPLODED`) against entries of that category whose code
//!    ends in a generic suffix such as `_ERROR` (`medium`);
//! 3. a generic fallback (`low`).
//!
//! Custom suggestions shadow built-ins and can be removed again; the
//! built-in table never changes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::patterns::{PatternKind, SeverityLevel};

/// Code suffixes that mark a category's catch-all entry.
const GENERIC_SUFFIXES: [&str; 2] = ["_ERROR", "_FAILED"];

/// Guidance for one event code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionEntry {
    /// Subsystem category, lower case.
    pub category: String,
    /// How serious the event usually is.
    pub severity: SeverityLevel,
    /// Things to check, most likely first.
    pub suggestions: Vec<String>,
    /// Codes that often appear alongside.
    #[serde(default)]
    pub related_codes: Vec<String>,
    /// Where to read more.
    #[serde(default)]
    pub documentation: Option<String>,
}

impl SuggestionEntry {
    /// Entry with no related codes or documentation.
    pub fn new<I, S>(category: impl Into<String>, severity: SeverityLevel, suggestions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            category: category.into(),
            severity,
            suggestions: suggestions.into_iter().map(Into::into).collect(),
            related_codes: Vec::new(),
            documentation: None,
        }
    }

    /// Add related codes.
    pub fn related<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.related_codes.extend(codes.into_iter().map(Into::into));
        self
    }

    /// Set the documentation pointer.
    pub fn documentation(mut self, doc: impl Into<String>) -> Self {
        self.documentation = Some(doc.into());
        self
    }
}

/// How closely a suggestion matches the requested code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// Generic fallback.
    Low,
    /// Same category, generic entry.
    Medium,
    /// Exact code.
    High,
}

/// Result of a lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionResult {
    /// Code that was asked for.
    pub code: String,
    /// Table entry that answered, if any.
    pub matched_code: Option<String>,
    /// Match quality.
    pub confidence: Confidence,
    /// The guidance.
    pub entry: SuggestionEntry,
}

/// A search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Matching code.
    pub code: String,
    /// Its entry.
    pub entry: SuggestionEntry,
    /// `true` if it comes from the custom table.
    pub custom: bool,
}

/// Built-in plus custom suggestion tables.
#[derive(Debug, Clone)]
pub struct SuggestionBook {
    builtin: BTreeMap<String, SuggestionEntry>,
    custom: BTreeMap<String, SuggestionEntry>,
}

impl Default for SuggestionBook {
    fn default() -> Self {
        Self::new()
    }
}

impl SuggestionBook {
    /// Book with the built-in table and no custom entries.
    pub fn new() -> Self {
        Self {
            builtin: builtin_table(),
            custom: BTreeMap::new(),
        }
    }

    /// Look up guidance for `code`. Always returns something.
    pub fn get(&self, code: &str) -> SuggestionResult {
        if let Some(entry) = self.exact(code) {
            return SuggestionResult {
                code: code.to_owned(),
                matched_code: Some(code.to_owned()),
                confidence: Confidence::High,
                entry: entry.clone(),
            };
        }

        if let Some((matched, entry)) = self.partial(code) {
            return SuggestionResult {
                code: code.to_owned(),
                matched_code: Some(matched.to_owned()),
                confidence: Confidence::Medium,
                entry: entry.clone(),
            };
        }

        SuggestionResult {
            code: code.to_owned(),
            matched_code: None,
            confidence: Confidence::Low,
            entry: generic_entry(code),
        }
    }

    /// Canned guidance for a detected pattern.
    pub fn for_pattern(&self, kind: PatternKind) -> SuggestionEntry {
        match kind {
            PatternKind::Repeating => SuggestionEntry::new(
                "patterns",
                SeverityLevel::Medium,
                [
                    "The same code keeps firing; look for a per-frame call site",
                    "Check whether a failed resource is retried every frame without backoff",
                    "Fix the first occurrence; later ones are usually identical",
                ],
            ),
            PatternKind::Cascade => SuggestionEntry::new(
                "patterns",
                SeverityLevel::High,
                [
                    "Many errors in a short burst usually share one root cause",
                    "Start from the earliest entry in the cascade (its trigger code)",
                    "Look for an invalid state that downstream subsystems keep reading",
                ],
            ),
        }
    }

    /// Case-insensitive substring search over code, category and
    /// suggestion text. Custom entries come first.
    pub fn search(&self, query: &str) -> Vec<SearchHit> {
        let needle = query.to_lowercase();
        let matches = |code: &str, entry: &SuggestionEntry| {
            code.to_lowercase().contains(&needle)
                || entry.category.to_lowercase().contains(&needle)
                || entry
                    .suggestions
                    .iter()
                    .any(|s| s.to_lowercase().contains(&needle))
        };

        let custom = self
            .custom
            .iter()
            .filter(|(code, entry)| matches(code, entry))
            .map(|(code, entry)| SearchHit {
                code: code.clone(),
                entry: entry.clone(),
                custom: true,
            });
        let builtin = self
            .builtin
            .iter()
            .filter(|(code, _)| !self.custom.contains_key(*code))
            .filter(|(code, entry)| matches(code, entry))
            .map(|(code, entry)| SearchHit {
                code: code.clone(),
                entry: entry.clone(),
                custom: false,
            });
        custom.chain(builtin).collect()
    }

    /// Add or replace a custom suggestion. Returns the previous custom entry.
    pub fn add_suggestion(
        &mut self,
        code: impl Into<String>,
        entry: SuggestionEntry,
    ) -> Option<SuggestionEntry> {
        let code = code.into();
        debug!(code = %code, category = %entry.category, "custom suggestion added");
        self.custom.insert(code, entry)
    }

    /// Remove a custom suggestion. Built-ins cannot be removed.
    pub fn remove_suggestion(&mut self, code: &str) -> Option<SuggestionEntry> {
        self.custom.remove(code)
    }

    /// Codes in the custom table.
    pub fn custom_codes(&self) -> Vec<String> {
        self.custom.keys().cloned().collect()
    }

    /// Total distinct codes across both tables.
    pub fn len(&self) -> usize {
        self.builtin.len() + self.custom.keys().filter(|c| !self.builtin.contains_key(*c)).count()
    }

    /// Returns `true` if both tables are empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn exact(&self, code: &str) -> Option<&SuggestionEntry> {
        self.custom.get(code).or_else(|| self.builtin.get(code))
    }

    fn partial(&self, code: &str) -> Option<(&str, &SuggestionEntry)> {
        let token = code.split('_').next().filter(|t| !t.is_empty())?;
        let category = token.to_lowercase();
        self.custom
            .iter()
            .chain(self.builtin.iter())
            .find(|(candidate, entry)| {
                entry.category == category
                    && GENERIC_SUFFIXES.iter().any(|s| candidate.ends_with(s))
            })
            .map(|(candidate, entry)| (candidate.as_str(), entry))
    }
}

fn generic_entry(code: &str) -> SuggestionEntry {
    let category = code
        .split('_')
        .next()
        .filter(|t| !t.is_empty())
        .map_or_else(|| "general".to_owned(), str::to_lowercase);
    SuggestionEntry::new(
        category,
        SeverityLevel::Low,
        [
            "Query recent entries with the same code to see when it started",
            "Inspect the context snapshot attached to the entry",
            "Check related entries from the same frame and subsystem",
        ],
    )
}

fn builtin_table() -> BTreeMap<String, SuggestionEntry> {
    let entries = [
        (
            "PHYSICS_UPDATE_ERROR",
            SuggestionEntry::new(
                "physics",
                SeverityLevel::High,
                [
                    "Check for bodies with NaN positions or velocities",
                    "Verify colliders were not removed while still referenced",
                    "Clamp the frame delta passed to the physics step",
                ],
            )
            .related(["PHYSICS_BODY_MISSING", "PHYSICS_SLOW_STEP"]),
        ),
        (
            "PHYSICS_BODY_MISSING",
            SuggestionEntry::new(
                "physics",
                SeverityLevel::Medium,
                [
                    "Make sure the physics body is created before it is queried",
                    "Check that game objects are removed before their physics bodies",
                ],
            )
            .related(["PHYSICS_UPDATE_ERROR"]),
        ),
        (
            "PHYSICS_SLOW_STEP",
            SuggestionEntry::new(
                "physics",
                SeverityLevel::Low,
                [
                    "Reduce the number of active bodies or let idle bodies sleep",
                    "Lower solver iterations for distant objects",
                ],
            ),
        ),
        (
            "PLAYER_FALL_OUT_OF_BOUNDS",
            SuggestionEntry::new(
                "player",
                SeverityLevel::Medium,
                [
                    "Check the level geometry for gaps near the reported position",
                    "Add a kill plane that respawns the player",
                    "Verify the player collider is enabled after teleports",
                ],
            ),
        ),
        (
            "PLAYER_STATE_ERROR",
            SuggestionEntry::new(
                "player",
                SeverityLevel::High,
                [
                    "Check the player state machine for missing transitions",
                    "Verify player state is reset on respawn",
                ],
            ),
        ),
        (
            "INPUT_GAMEPAD_DISCONNECTED",
            SuggestionEntry::new(
                "input",
                SeverityLevel::Low,
                [
                    "Pause the game and prompt the player to reconnect",
                    "Fall back to keyboard input",
                ],
            ),
        ),
        (
            "INPUT_BINDING_FAILED",
            SuggestionEntry::new(
                "input",
                SeverityLevel::Medium,
                [
                    "Check the bindings file for unknown action names",
                    "Reset bindings to defaults when the file is invalid",
                ],
            ),
        ),
        (
            "ASSET_LOAD_FAILED",
            SuggestionEntry::new(
                "asset",
                SeverityLevel::High,
                [
                    "Verify the asset path and its case",
                    "Check that the asset is included in the build",
                    "Look for a corrupt or unsupported file format",
                ],
            )
            .related(["AUDIO_DECODE_ERROR", "SCENE_LOAD_FAILED"])
            .documentation("docs/assets.md"),
        ),
        (
            "AUDIO_DECODE_ERROR",
            SuggestionEntry::new(
                "audio",
                SeverityLevel::Medium,
                [
                    "Re-encode the clip in a supported format",
                    "Check the sample rate matches the mixer",
                ],
            )
            .related(["ASSET_LOAD_FAILED"]),
        ),
        (
            "RENDER_DEVICE_LOST",
            SuggestionEntry::new(
                "render",
                SeverityLevel::Critical,
                [
                    "Recreate the rendering surface and its resources",
                    "Update graphics drivers",
                    "Check for out-of-memory on the GPU",
                ],
            ),
        ),
        (
            "RENDER_PIPELINE_ERROR",
            SuggestionEntry::new(
                "render",
                SeverityLevel::High,
                [
                    "Check shader compilation output",
                    "Verify vertex layouts match the shader inputs",
                ],
            ),
        ),
        (
            "SCENE_LOAD_FAILED",
            SuggestionEntry::new(
                "scene",
                SeverityLevel::High,
                [
                    "Validate the scene file against the current schema",
                    "Check that every referenced asset exists",
                ],
            )
            .related(["ASSET_LOAD_FAILED"]),
        ),
        (
            "SAVE_STATE_ERROR",
            SuggestionEntry::new(
                "save",
                SeverityLevel::High,
                [
                    "Check write permissions of the save directory",
                    "Make sure saved state does not contain cyclic references",
                ],
            ),
        ),
        (
            "CORE_FRAME_BUDGET_EXCEEDED",
            SuggestionEntry::new(
                "core",
                SeverityLevel::Low,
                [
                    "Profile the frame to find the slowest system",
                    "Spread expensive work over several frames",
                ],
            ),
        ),
    ];
    entries
        .into_iter()
        .map(|(code, entry)| (code.to_owned(), entry))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
