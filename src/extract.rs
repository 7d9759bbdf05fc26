use std::fmt;

use thiserror::Error;

use crate::dom::{Document, Element};

/// The closed set of report fields, in the order the sink writes them.
pub const FIELD_KEYS: [&str; 14] = [
    "weatherIcon",
    "villageTemp",
    "villageWind",
    "villageVisibility",
    "todayWeatherIcon",
    "tomorrowWeatherIcon",
    "nextDayWeatherIcon",
    "todayHigh",
    "todayLow",
    "tomorrowHigh",
    "tomorrowLow",
    "nextDayHigh",
    "nextDayLow",
    "todaysForecastComment",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    NotFound,
    IndexOutOfRange,
    MissingAttribute,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Reason::NotFound => "no matching element",
            Reason::IndexOutOfRange => "match index out of range",
            Reason::MissingAttribute => "expected attribute missing",
        };
        f.write_str(s)
    }
}

/// A structural assumption about the feed did not hold for one field.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("field `{field}`: {reason}")]
pub struct FieldError {
    pub field: &'static str,
    pub reason: Reason,
}

/// Ordered field-key → raw-value mapping handed to the sink.
/// Values are untouched feed text; trimming happens at write time.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FieldMap {
    entries: Vec<(&'static str, String)>,
}

impl FieldMap {
    pub(crate) fn insert(&mut self, key: &'static str, value: String) {
        self.entries.push((key, value));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.entries.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Map a dwml forecast document to the fourteen report fields.
///
/// The feed reuses element names across unrelated contexts and encodes the
/// day/night forecast split purely in document order, so most rules below
/// select by position, not by semantic identity. The indices are load-bearing
/// and must not be "corrected".
pub fn extract_fields(doc: &Document) -> Result<FieldMap, FieldError> {
    let mut map = FieldMap::default();

    let observations = parameter_groups(doc, "current observations");

    // Current conditions icon: first weather-conditions carrying a summary.
    let summaries: Vec<&Element> = descendants_named(&observations, "weather-conditions")
        .into_iter()
        .filter(|el| el.attr("weather-summary").is_some())
        .collect();
    let icon = pick("weatherIcon", &summaries, 0)?;
    map.insert("weatherIcon", summary_attr("weatherIcon", icon)?);

    // Apparent temperature.
    let apparent: Vec<&Element> = descendants_named(&observations, "temperature")
        .into_iter()
        .filter(|el| el.attr("type") == Some("apparent"))
        .collect();
    map.insert("villageTemp", pick("villageTemp", &apparent, 0)?.value());

    // Wind direction.
    let wind: Vec<&Element> = descendants_named(&observations, "direction")
        .into_iter()
        .filter(|el| el.attr("type") == Some("wind"))
        .collect();
    map.insert("villageWind", pick("villageWind", &wind, 0)?.value());

    // Visibility rides on the *second* unfiltered weather-conditions
    // occurrence; index 0 is the icon-bearing sibling consumed above.
    let conditions = descendants_named(&observations, "weather-conditions");
    map.insert(
        "villageVisibility",
        pick("villageVisibility", &conditions, 1)?.value(),
    );

    // Day icons: weather-conditions children of every weather element,
    // whole document. Even indices are daytime, odd are the night entries.
    let day_conditions: Vec<&Element> = doc
        .descendants()
        .filter(|el| el.name == "weather")
        .flat_map(|el| el.children_named("weather-conditions"))
        .collect();
    for (field, idx) in [
        ("todayWeatherIcon", 0),
        ("tomorrowWeatherIcon", 2),
        ("nextDayWeatherIcon", 4),
    ] {
        let el = pick(field, &day_conditions, idx)?;
        map.insert(field, summary_attr(field, el)?);
    }

    // Highs and lows: value children of the maximum/minimum temperature
    // elements, flattened in document order, one entry per day.
    let temperatures: Vec<&Element> = doc
        .descendants()
        .filter(|el| el.name == "temperature")
        .collect();
    let highs = temperature_values(&temperatures, "maximum");
    let lows = temperature_values(&temperatures, "minimum");
    for (field, list, idx) in [
        ("todayHigh", &highs, 0),
        ("todayLow", &lows, 0),
        ("tomorrowHigh", &highs, 1),
        ("tomorrowLow", &lows, 1),
        ("nextDayHigh", &highs, 2),
        ("nextDayLow", &lows, 2),
    ] {
        map.insert(field, pick(field, list, idx)?.value());
    }

    // Worded forecast for right now.
    let forecast = parameter_groups(doc, "forecast");
    let worded: Vec<&Element> = descendants_named(&forecast, "wordedForecast")
        .into_iter()
        .flat_map(|el| el.children_named("text"))
        .collect();
    map.insert(
        "todaysForecastComment",
        pick("todaysForecastComment", &worded, 0)?.value(),
    );

    Ok(map)
}

/// The `parameters` children of every `data` element whose `type` attribute
/// matches `kind` ("current observations" or "forecast").
fn parameter_groups<'a>(doc: &'a Document, kind: &str) -> Vec<&'a Element> {
    doc.descendants()
        .filter(|el| el.name == "data" && el.attr("type") == Some(kind))
        .flat_map(|el| el.children_named("parameters"))
        .collect()
}

fn descendants_named<'a>(groups: &[&'a Element], name: &str) -> Vec<&'a Element> {
    groups
        .iter()
        .flat_map(|g| g.descendants())
        .filter(|el| el.name == name)
        .collect()
}

fn temperature_values<'a>(temperatures: &[&'a Element], kind: &str) -> Vec<&'a Element> {
    temperatures
        .iter()
        .filter(|el| el.attr("type") == Some(kind))
        .flat_map(|el| el.children_named("value"))
        .collect()
}

/// Checked positional access: empty match list means the feed lacks the
/// element entirely, a short list means the expected occurrence is missing.
fn pick<'a>(
    field: &'static str,
    matches: &[&'a Element],
    idx: usize,
) -> Result<&'a Element, FieldError> {
    if matches.is_empty() {
        return Err(FieldError {
            field,
            reason: Reason::NotFound,
        });
    }
    matches.get(idx).copied().ok_or(FieldError {
        field,
        reason: Reason::IndexOutOfRange,
    })
}

fn summary_attr(field: &'static str, el: &Element) -> Result<String, FieldError> {
    el.attr("weather-summary")
        .map(str::to_owned)
        .ok_or(FieldError {
            field,
            reason: Reason::MissingAttribute,
        })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom;

    fn sample() -> String {
        std::fs::read_to_string("tests/fixtures/dwml_sample.xml").unwrap()
    }

    fn extract(xml: &str) -> Result<FieldMap, FieldError> {
        extract_fields(&dom::parse(xml).unwrap())
    }

    #[test]
    fn sample_maps_every_field() {
        let map = extract(&sample()).unwrap();
        assert_eq!(map.len(), FIELD_KEYS.len());
        let keys: Vec<&str> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, FIELD_KEYS);
    }

    #[test]
    fn current_conditions() {
        let map = extract(&sample()).unwrap();
        assert_eq!(map.get("weatherIcon"), Some("Partly Cloudy"));
        assert_eq!(map.get("villageTemp"), Some("37"));
        assert_eq!(map.get("villageWind"), Some("240"));
        assert_eq!(map.get("villageVisibility"), Some("10.00"));
    }

    #[test]
    fn day_icons_skip_night_entries() {
        let map = extract(&sample()).unwrap();
        // Indices 0/2/4 of six forecast entries; odd (night) entries
        // "Mostly Clear", "Chance Rain", "Partly Cloudy" never surface.
        assert_eq!(map.get("todayWeatherIcon"), Some("Sunny"));
        assert_eq!(map.get("tomorrowWeatherIcon"), Some("Rain"));
        assert_eq!(map.get("nextDayWeatherIcon"), Some("Snow"));
    }

    #[test]
    fn highs_and_lows_by_day() {
        let map = extract(&sample()).unwrap();
        assert_eq!(map.get("todayHigh"), Some("41"));
        assert_eq!(map.get("todayLow"), Some("30"));
        assert_eq!(map.get("tomorrowHigh"), Some("38"));
        assert_eq!(map.get("tomorrowLow"), Some("25"));
        assert_eq!(map.get("nextDayHigh"), Some("44"));
        assert_eq!(map.get("nextDayLow"), Some("28"));
    }

    #[test]
    fn worded_forecast_keeps_raw_whitespace() {
        let map = extract(&sample()).unwrap();
        // Raw feed text passes through; the sink trims, not the extractor.
        assert_eq!(
            map.get("todaysForecastComment"),
            Some("Sunny, with a high near 41. ")
        );
    }

    #[test]
    fn missing_apparent_temperature_is_not_found() {
        let xml = sample().replace("type=\"apparent\"", "type=\"felt\"");
        let err = extract(&xml).unwrap_err();
        assert_eq!(
            err,
            FieldError {
                field: "villageTemp",
                reason: Reason::NotFound,
            }
        );
    }

    #[test]
    fn single_observation_condition_is_out_of_range() {
        // Only the icon-bearing occurrence present: visibility needs index 1.
        let xml = r#"<dwml>
            <data type="forecast">
              <parameters>
                <temperature type="maximum"><value>41</value><value>38</value><value>44</value></temperature>
                <temperature type="minimum"><value>30</value><value>25</value><value>28</value></temperature>
                <weather>
                  <weather-conditions weather-summary="Sunny"/>
                  <weather-conditions weather-summary="Clear"/>
                  <weather-conditions weather-summary="Rain"/>
                  <weather-conditions weather-summary="Showers"/>
                  <weather-conditions weather-summary="Snow"/>
                </weather>
                <wordedForecast><text>Sunny.</text></wordedForecast>
              </parameters>
            </data>
            <data type="current observations">
              <parameters>
                <weather-conditions weather-summary="Fair"/>
                <temperature type="apparent"><value>37</value></temperature>
                <direction type="wind"><value>240</value></direction>
              </parameters>
            </data>
          </dwml>"#;
        let err = extract(xml).unwrap_err();
        assert_eq!(
            err,
            FieldError {
                field: "villageVisibility",
                reason: Reason::IndexOutOfRange,
            }
        );
    }

    #[test]
    fn day_icon_without_summary_is_missing_attribute() {
        let xml = sample().replacen("weather-summary=\"Sunny\"", "stale=\"1\"", 1);
        let err = extract(&xml).unwrap_err();
        assert_eq!(
            err,
            FieldError {
                field: "todayWeatherIcon",
                reason: Reason::MissingAttribute,
            }
        );
    }

    #[test]
    fn extraction_is_idempotent() {
        let doc = dom::parse(&sample()).unwrap();
        assert_eq!(extract_fields(&doc).unwrap(), extract_fields(&doc).unwrap());
    }
}
