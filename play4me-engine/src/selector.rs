use std::{collections::HashSet, sync::Arc};

use play4me_models::{HistoryItem, Playlist, SongSlot, TopArtist, Track};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use time::{OffsetDateTime, UtcOffset, macros::format_description};

use crate::{
    EngineConfig, Error, Result,
    provider::{JsonSchema, MusicProvider, SongGenerator},
};

const SCHEMA_NAME: &str = "RadioSongSlots";
const SCHEMA_DESCRIPTION: &str = "The scheduled songs slots";

pub struct SelectionRequest<'a> {
    pub count: usize,
    pub playlist: &'a Playlist,
    pub history: &'a [HistoryItem],
    pub taste: &'a [TopArtist],
}

/// History and taste signals for one selection, gathered according to the
/// playlist settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionContext {
    pub history: Vec<HistoryItem>,
    pub taste: Vec<TopArtist>,
}

impl SelectionContext {
    /// `queued` is always part of the history. Recently played tracks and top
    /// artists are only fetched when the playlist asks for them.
    pub async fn gather(
        provider: &dyn MusicProvider,
        playlist: &Playlist,
        queued: &[Track],
        config: &EngineConfig,
    ) -> Result<Self> {
        let mut history: Vec<HistoryItem> = queued.iter().map(HistoryItem::from).collect();

        if playlist.settings.dont_repeat_from_history {
            let played = provider.recently_played(config.recently_played_limit).await?;
            history.extend(played.iter().map(HistoryItem::from));
        }

        let taste = if playlist.settings.use_preferences {
            provider.top_artists(config.top_artists_limit).await?
        } else {
            vec![]
        };

        Ok(Self { history, taste })
    }
}

pub struct TrackSelector {
    generator: Arc<dyn SongGenerator>,
    utc_offset: UtcOffset,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SlotsResponse {
    Wrapped { slots: Vec<SongSlot> },
    Bare(Vec<SongSlot>),
}

impl From<SlotsResponse> for Vec<SongSlot> {
    fn from(value: SlotsResponse) -> Self {
        match value {
            SlotsResponse::Wrapped { slots } => slots,
            SlotsResponse::Bare(slots) => slots,
        }
    }
}

impl TrackSelector {
    pub fn new(generator: Arc<dyn SongGenerator>) -> Self {
        Self {
            generator,
            utc_offset: UtcOffset::UTC,
        }
    }

    /// Offset used for the listener's clock in prompts. The local offset has
    /// to be read before the runtime starts its worker threads.
    pub fn with_utc_offset(mut self, utc_offset: UtcOffset) -> Self {
        self.utc_offset = utc_offset;
        self
    }

    /// Returns at most `count` tracks, none of which appear in the history or
    /// twice in the result. A short result is not an error.
    pub async fn select_tracks(
        &self,
        provider: &dyn MusicProvider,
        request: SelectionRequest<'_>,
    ) -> Result<Vec<Track>> {
        if request.count == 0 {
            return Ok(vec![]);
        }

        let slots = self.generate_slots(&request).await?;
        tracing::debug!(
            "Generated {} slots for playlist {}",
            slots.len(),
            request.playlist.id
        );

        let mut seen: HashSet<String> = request
            .history
            .iter()
            .map(|item| item.uri.clone())
            .collect();
        let mut selected = Vec::with_capacity(request.count);

        for slot in &slots {
            if let Some(track) = resolve_slot(provider, slot, &seen).await {
                seen.insert(track.uri.clone());
                selected.push(track);
            }

            if selected.len() >= request.count {
                break;
            }
        }

        Ok(selected)
    }

    async fn generate_slots(&self, request: &SelectionRequest<'_>) -> Result<Vec<SongSlot>> {
        let prompt = build_prompt(request, &clock_time(OffsetDateTime::now_utc(), self.utc_offset));
        let schema = slots_schema();
        let value = self
            .generator
            .complete_json(
                &prompt,
                &JsonSchema {
                    name: SCHEMA_NAME,
                    description: SCHEMA_DESCRIPTION,
                    schema: &schema,
                },
            )
            .await?;

        parse_slots(value)
    }
}

/// Searches both options of a slot concurrently and returns the first hit
/// that has not been seen yet. Search failures count as no match.
async fn resolve_slot(
    provider: &dyn MusicProvider,
    slot: &SongSlot,
    seen: &HashSet<String>,
) -> Option<Track> {
    let [a, b] = slot.options();
    let (a, b) = futures::join!(
        provider.search_track(&a.title, &a.artist),
        provider.search_track(&b.title, &b.artist),
    );

    [a, b]
        .into_iter()
        .zip(slot.options())
        .filter_map(|(result, option)| match result {
            Ok(track) => track,
            Err(error) => {
                tracing::warn!(
                    "Search for {} by {} failed: {error}",
                    option.title,
                    option.artist
                );
                None
            }
        })
        .find(|track| !seen.contains(&track.uri))
}

fn parse_slots(value: Value) -> Result<Vec<SongSlot>> {
    serde_json::from_value::<SlotsResponse>(value)
        .map(Into::into)
        .map_err(|e| Error::Generation {
            message: format!("completion does not match {SCHEMA_NAME}: {e}"),
        })
}

fn clock_time(now: OffsetDateTime, utc_offset: UtcOffset) -> String {
    now.to_offset(utc_offset)
        .format(format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_default()
}

#[derive(Serialize)]
struct PromptHistoryItem<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Serialize)]
struct PromptArtist<'a> {
    genres: &'a [String],
    name: &'a str,
}

fn build_prompt(request: &SelectionRequest<'_>, current_time: &str) -> String {
    let count = request.count;
    let candidates = count * 2;

    let history: Vec<_> = request
        .history
        .iter()
        .map(|item| PromptHistoryItem {
            name: &item.name,
            kind: &item.kind,
        })
        .collect();
    let history = serde_json::to_string(&history).unwrap_or_default();

    let taste = if request.playlist.settings.use_preferences {
        let artists: Vec<_> = request
            .taste
            .iter()
            .map(|artist| PromptArtist {
                genres: &artist.genres,
                name: &artist.name,
            })
            .collect();
        serde_json::to_string(&artists).unwrap_or_default()
    } else {
        "[]".to_string()
    };

    format!(
        r#"You are an expert music radio programmer.

Your task is to analyze the user's radio description and generate
**an array of {candidates} song recommendations** intended to fill the next **{count} scheduled radio slots**.
Each slot should have **two candidate songs**, allowing dynamic radio-style decision-making.
Choose songs similar to the user's top artists and genres when applicable.

**Rules:**
- Treat the output as programming a live radio sequence.
- For each upcoming slot, provide **2 different possible songs** that match the required energy, theme, and mood.
- Maintain smooth radio-style transitions (energy flow, genre coherence, mood shaping).
- Always respect the requested genres. If diversity is requested, vary only *within* the allowed genres.
- Include natural variance. Avoid repetitive patterns in era, style, or artists.
- Never select any song that appears in the provided history unless explicitly allowed.

**Radio Description**
{description}

**Scheduled history**
{history}

**User top artists**
{taste}

**Other information**
Current Time: {current_time}
"#,
        description = request.playlist.description,
    )
}

fn slots_schema() -> Value {
    let option = |description: &str| {
        json!({
            "type": "object",
            "description": description,
            "properties": {
                "title": {"type": "string", "description": "The song title"},
                "artist": {"type": "string", "description": "The primary artist of the song"}
            },
            "required": ["title", "artist"],
            "additionalProperties": false
        })
    };

    json!({
        "type": "object",
        "properties": {
            "slots": {
                "type": "array",
                "description": "The scheduled songs slots. They must be unique and not contain duplicates.",
                "items": {
                    "type": "object",
                    "description": "The radio music schedule slot.",
                    "properties": {
                        "a": option("The slot option A."),
                        "b": option("The slot option B.")
                    },
                    "required": ["a", "b"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["slots"],
        "additionalProperties": false
    })
}
