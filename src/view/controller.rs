// src/view/controller.rs
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use log::debug;
use serde::Serialize;
use tokio::time::Instant;
use crate::config::Config;
use crate::flags::region_flag;
use crate::models::server::ServerRecord;
use crate::normalize::is_address_query;
use super::caption::Caption;
use super::debounce::Debouncer;

pub const ALL_GAMEMODES: &str = "all";

// Offered in the gamemode dropdown while the listing is empty.
const FALLBACK_GAMEMODES: [&str; 2] = ["Roleplay", "Freeroam"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SortMode {
    #[default]
    #[serde(rename = "default")]
    Default,
    #[serde(rename = "mostPlayers")]
    MostPlayers,
    #[serde(rename = "fewestPlayers")]
    FewestPlayers,
    #[serde(rename = "nameAZ")]
    NameAscending,
    #[serde(rename = "nameZA")]
    NameDescending,
}

impl FromStr for SortMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "default" => Ok(Self::Default),
            "mostPlayers" => Ok(Self::MostPlayers),
            "fewestPlayers" => Ok(Self::FewestPlayers),
            "nameAZ" => Ok(Self::NameAscending),
            "nameZA" => Ok(Self::NameDescending),
            other => Err(format!("unknown sort mode: {}", other)),
        }
    }
}

impl SortMode {
    fn compare(self, a: &ServerRecord, b: &ServerRecord) -> Ordering {
        match self {
            Self::Default => Ordering::Equal,
            Self::MostPlayers => b.player_count.cmp(&a.player_count),
            Self::FewestPlayers => a.player_count.cmp(&b.player_count),
            Self::NameAscending => compare_names(&a.name, &b.name),
            Self::NameDescending => compare_names(&b.name, &a.name),
        }
    }
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
}

/// Result of a single-address lookup as seen by the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Found(ServerRecord),
    NotFound,
    Failed,
}

/// Handed out when a lookup should be issued; must come back with the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupTicket {
    pub seq: u64,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupState {
    Inactive,
    Pending { seq: u64, address: String },
    Found(ServerRecord),
    NotFound,
    Failed,
}

impl LookupState {
    fn label(&self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Pending { .. } => "pending",
            Self::Found(_) => "found",
            Self::NotFound => "notFound",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ViewSettings {
    pub page_size: usize,
    pub debounce: Duration,
    pub listing_limit: usize,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for ViewSettings {
    fn from(config: &Config) -> Self {
        Self {
            page_size: config.page_size.max(1),
            debounce: config.search_debounce(),
            listing_limit: config.listing_limit,
        }
    }
}

pub struct ListView {
    settings: ViewSettings,
    search_text: String,
    search: Debouncer<String>,
    gamemode_filter: String,
    sort_mode: SortMode,
    bulk: Vec<ServerRecord>,
    lookup: LookupState,
    last_seq: u64,
    current_page: usize,
}

impl fmt::Debug for ListView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListView")
            .field("search_text", &self.search_text)
            .field("debounced", self.search.value())
            .field("gamemode_filter", &self.gamemode_filter)
            .field("sort_mode", &self.sort_mode)
            .field("bulk", &self.bulk.len())
            .field("lookup", &self.lookup.label())
            .field("current_page", &self.current_page)
            .finish()
    }
}

impl ListView {
    pub fn new(settings: ViewSettings) -> Self {
        Self {
            search: Debouncer::new(String::new(), settings.debounce),
            settings,
            search_text: String::new(),
            gamemode_filter: ALL_GAMEMODES.to_string(),
            sort_mode: SortMode::Default,
            bulk: Vec::new(),
            lookup: LookupState::Inactive,
            last_seq: 0,
            current_page: 1,
        }
    }

    /// Replaces the bulk snapshot with a freshly fetched one.
    pub fn set_bulk_records(&mut self, records: Vec<ServerRecord>) {
        self.bulk = records;
        self.clamp_page();
    }

    /// Applies a keystroke. The search itself runs once the debounce settles in `poll`.
    pub fn type_search(&mut self, text: &str, now: Instant) {
        self.search_text = text.to_string();
        self.search.push(text.to_string(), now);
        self.current_page = 1;
    }

    /// Settles the debounced search if its quiet period is over. Returns a ticket when
    /// the settled text is an address that must be looked up.
    pub fn poll(&mut self, now: Instant) -> Option<LookupTicket> {
        let settled = self.search.poll(now)?.clone();
        self.apply_search(settled)
    }

    /// Sets and settles the search text at once, without debouncing.
    pub fn submit_search(&mut self, text: &str) -> Option<LookupTicket> {
        self.search_text = text.to_string();
        if !self.search.settle_now(text.to_string()) {
            return None;
        }
        self.apply_search(text.to_string())
    }

    fn apply_search(&mut self, settled: String) -> Option<LookupTicket> {
        // Any new settlement supersedes a lookup still in flight.
        self.last_seq += 1;
        self.current_page = 1;

        if is_address_query(&settled) {
            self.lookup = LookupState::Pending {
                seq: self.last_seq,
                address: settled.clone(),
            };
            Some(LookupTicket {
                seq: self.last_seq,
                address: settled,
            })
        } else {
            self.lookup = LookupState::Inactive;
            None
        }
    }

    /// Applies a lookup result. Results for anything but the latest query are dropped.
    pub fn resolve_lookup(&mut self, ticket: &LookupTicket, outcome: LookupOutcome) -> bool {
        let pending = matches!(&self.lookup, LookupState::Pending { seq, .. } if *seq == ticket.seq);
        if !pending || ticket.seq != self.last_seq || ticket.address != *self.search.value() {
            debug!("Discarding stale lookup #{} for {}", ticket.seq, ticket.address);
            return false;
        }

        self.lookup = match outcome {
            LookupOutcome::Found(record) => LookupState::Found(record),
            LookupOutcome::NotFound => LookupState::NotFound,
            LookupOutcome::Failed => LookupState::Failed,
        };
        self.clamp_page();
        true
    }

    pub fn set_gamemode_filter(&mut self, mode: &str) -> bool {
        if !self.controls_enabled() {
            return false;
        }
        let mode = mode.trim();
        self.gamemode_filter = if mode.is_empty() {
            ALL_GAMEMODES.to_string()
        } else {
            mode.to_string()
        };
        self.current_page = 1;
        true
    }

    pub fn set_sort_mode(&mut self, mode: SortMode) -> bool {
        if !self.controls_enabled() {
            return false;
        }
        self.sort_mode = mode;
        self.current_page = 1;
        true
    }

    pub fn set_page(&mut self, page: usize) -> usize {
        self.current_page = page;
        self.clamp_page();
        self.current_page
    }

    fn clamp_page(&mut self) {
        let last = self.total_pages().max(1);
        self.current_page = self.current_page.clamp(1, last);
    }

    /// Gamemode and sort controls are inert while a lookup result is shown.
    pub fn controls_enabled(&self) -> bool {
        !matches!(self.lookup, LookupState::Found(_))
    }

    pub fn lookup_state(&self) -> &LookupState {
        &self.lookup
    }

    pub fn debounced_search(&self) -> &str {
        self.search.value()
    }

    pub fn search_deadline(&self) -> Option<Instant> {
        self.search.deadline()
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    fn search_active(&self) -> bool {
        !self.search.value().is_empty()
    }

    fn gamemode_active(&self) -> bool {
        self.gamemode_filter != ALL_GAMEMODES
    }

    pub fn visible(&self) -> Vec<&ServerRecord> {
        match &self.lookup {
            LookupState::Found(record) => return vec![record],
            LookupState::Pending { .. } | LookupState::NotFound | LookupState::Failed => {
                return Vec::new();
            }
            LookupState::Inactive => {}
        }

        let search = self.search.value();
        let needle = search.to_lowercase();
        let filter_text = !search.is_empty() && !is_address_query(search);
        let mode = self.gamemode_filter.to_lowercase();

        let mut servers: Vec<&ServerRecord> = self
            .bulk
            .iter()
            .filter(|server| {
                !filter_text
                    || server.name.to_lowercase().contains(&needle)
                    || server.address.to_lowercase().contains(&needle)
            })
            .filter(|server| {
                !self.gamemode_active() || server.game_mode.to_lowercase().contains(&mode)
            })
            .collect();

        if self.sort_mode != SortMode::Default {
            servers.sort_by(|a, b| self.sort_mode.compare(a, b));
        }
        servers
    }

    pub fn total_pages(&self) -> usize {
        let size = self.settings.page_size;
        (self.visible().len() + size - 1) / size
    }

    pub fn page_items(&self) -> Vec<&ServerRecord> {
        let size = self.settings.page_size;
        self.visible()
            .into_iter()
            .skip((self.current_page - 1) * size)
            .take(size)
            .collect()
    }

    /// Distinct gamemodes of the bulk set for the filter dropdown.
    pub fn gamemodes(&self) -> Vec<String> {
        let mut modes: Vec<String> = self
            .bulk
            .iter()
            .map(|server| server.game_mode.trim())
            .filter(|mode| !mode.is_empty())
            .map(str::to_string)
            .collect();
        modes.sort_by(|a, b| compare_names(a, b));
        modes.dedup();

        if modes.is_empty() {
            return FALLBACK_GAMEMODES.iter().map(|m| m.to_string()).collect();
        }
        modes
    }

    pub fn caption(&self) -> Caption {
        match &self.lookup {
            LookupState::Pending { address, .. } => {
                return Caption::LookupPending { address: address.clone() };
            }
            LookupState::NotFound => {
                return Caption::LookupNotFound { address: self.search.value().clone() };
            }
            LookupState::Failed => {
                return Caption::LookupFailed { address: self.search.value().clone() };
            }
            LookupState::Found(record) => {
                return Caption::LookupFound {
                    address: record.address.clone(),
                    port: record.port,
                };
            }
            LookupState::Inactive => {}
        }

        if self.bulk.is_empty() {
            return Caption::DirectoryUnavailable;
        }

        let total = self.visible().len();
        if total == 0 && self.search_active() {
            return Caption::NoSearchMatches;
        }
        if total == 0 && self.gamemode_active() {
            return Caption::NoGamemodeMatches;
        }

        let size = self.settings.page_size;
        let from = (self.current_page - 1) * size + 1;
        let to = (self.current_page * size).min(total);

        let unfiltered = !self.search_active() && !self.gamemode_active() && total == self.bulk.len();
        if unfiltered && self.bulk.len() >= self.settings.listing_limit {
            return Caption::ListingCapped { from, to, shown: total };
        }

        Caption::Showing {
            from,
            to,
            total,
            fetched: self.bulk.len(),
        }
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        let caption = self.caption();
        ViewSnapshot {
            search_text: self.search_text.clone(),
            debounced_search_text: self.search.value().clone(),
            gamemode_filter: self.gamemode_filter.clone(),
            sort_mode: self.sort_mode,
            lookup: self.lookup.label(),
            controls_enabled: self.controls_enabled(),
            gamemodes: self.gamemodes(),
            current_page: self.current_page,
            total_pages: self.total_pages(),
            total_visible: self.visible().len(),
            rows: self.page_items().into_iter().map(ServerRow::from).collect(),
            caption_text: caption.to_string(),
            caption,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerRow {
    #[serde(flatten)]
    pub record: ServerRecord,
    pub flag: String,
    pub players: String,
    pub status: &'static str,
    pub connect_uri: String,
}

impl From<&ServerRecord> for ServerRow {
    fn from(record: &ServerRecord) -> Self {
        Self {
            flag: region_flag(&record.region_code),
            players: format!("{}/{}", record.player_count, record.max_players),
            status: if record.online { "Online" } else { "Offline" },
            connect_uri: record.connect_uri(),
            record: record.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSnapshot {
    pub search_text: String,
    pub debounced_search_text: String,
    pub gamemode_filter: String,
    pub sort_mode: SortMode,
    pub lookup: &'static str,
    pub controls_enabled: bool,
    pub gamemodes: Vec<String>,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_visible: usize,
    pub rows: Vec<ServerRow>,
    pub caption: Caption,
    pub caption_text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::server::RecordOrigin;

    fn record(name: &str, mode: &str, players: u32, ip: &str) -> ServerRecord {
        ServerRecord {
            id: format!("{}:7777", ip),
            name: name.to_string(),
            address: ip.to_string(),
            port: 7777,
            player_count: players,
            max_players: 100,
            game_mode: mode.to_string(),
            online: true,
            region_code: "us".to_string(),
            origin: RecordOrigin::Listing,
        }
    }

    fn numbered(count: usize) -> Vec<ServerRecord> {
        (1..=count)
            .map(|i| record(&format!("Server {}", i), if i % 2 == 0 { "Race" } else { "Roleplay" }, i as u32, &format!("10.0.0.{}", i)))
            .collect()
    }

    fn view_with(records: Vec<ServerRecord>) -> ListView {
        let mut view = ListView::new(ViewSettings::default());
        view.set_bulk_records(records);
        view
    }

    fn names(records: &[&ServerRecord]) -> Vec<String> {
        records.iter().map(|r| r.name.clone()).collect()
    }

    fn alpha_beta() -> Vec<ServerRecord> {
        vec![
            record("Alpha", "Roleplay", 5, "1.1.1.1"),
            record("Beta", "Race", 50, "2.2.2.2"),
        ]
    }

    #[test]
    fn sorts_by_players_and_name() {
        let mut view = view_with(alpha_beta());
        assert_eq!(names(&view.visible()), ["Alpha", "Beta"]);

        view.set_sort_mode(SortMode::MostPlayers);
        assert_eq!(names(&view.visible()), ["Beta", "Alpha"]);

        view.set_sort_mode(SortMode::NameAscending);
        assert_eq!(names(&view.visible()), ["Alpha", "Beta"]);

        view.set_sort_mode(SortMode::NameDescending);
        assert_eq!(names(&view.visible()), ["Beta", "Alpha"]);

        view.set_sort_mode(SortMode::FewestPlayers);
        assert_eq!(names(&view.visible()), ["Alpha", "Beta"]);
    }

    #[test]
    fn player_sort_is_stable_for_ties() {
        let mut view = view_with(vec![
            record("First", "Race", 7, "1.1.1.1"),
            record("Second", "Race", 9, "2.2.2.2"),
            record("Third", "Race", 7, "3.3.3.3"),
        ]);
        view.set_sort_mode(SortMode::FewestPlayers);
        assert_eq!(names(&view.visible()), ["First", "Third", "Second"]);
    }

    #[test]
    fn sort_mode_parses_wire_names() {
        assert_eq!("nameZA".parse::<SortMode>(), Ok(SortMode::NameDescending));
        assert_eq!("".parse::<SortMode>(), Ok(SortMode::Default));
        assert!("loudest".parse::<SortMode>().is_err());
    }

    #[test]
    fn free_text_matches_name_or_address_case_insensitively() {
        let mut view = view_with(alpha_beta());
        view.submit_search("ALP");
        assert_eq!(names(&view.visible()), ["Alpha"]);
        view.submit_search("2.2.2");
        assert_eq!(names(&view.visible()), ["Beta"]);
    }

    #[test]
    fn gamemode_filter_is_substring_match() {
        let mut view = view_with(alpha_beta());
        assert!(view.set_gamemode_filter("role"));
        assert_eq!(names(&view.visible()), ["Alpha"]);
        assert!(view.set_gamemode_filter(ALL_GAMEMODES));
        assert_eq!(view.visible().len(), 2);
    }

    #[test]
    fn address_search_bypasses_free_text_filter() {
        let mut view = view_with(alpha_beta());
        view.set_gamemode_filter("Race");

        let ticket = view.submit_search("12.34.56.78:7777").expect("lookup issued");
        assert_eq!(ticket.address, "12.34.56.78:7777");
        assert_eq!(view.lookup_state().label(), "pending");
        assert!(view.visible().is_empty());

        let mut found = record("Drift Kings", "Freeroam", 3, "12.34.56.78");
        found.origin = RecordOrigin::Lookup;
        assert!(view.resolve_lookup(&ticket, LookupOutcome::Found(found.clone())));

        assert_eq!(view.visible(), vec![&found]);
        assert_eq!(view.total_pages(), 1);
        assert!(!view.controls_enabled());
        assert!(!view.set_gamemode_filter("Roleplay"));
        assert!(!view.set_sort_mode(SortMode::MostPlayers));
        assert_eq!(
            view.caption(),
            Caption::LookupFound { address: "12.34.56.78".to_string(), port: 7777 }
        );
    }

    #[test]
    fn three_quick_keystrokes_issue_one_lookup() {
        let mut view = view_with(alpha_beta());
        let start = Instant::now();
        let mut tickets = Vec::new();

        for (i, text) in ["1.2.3.4:77", "1.2.3.4:777", "1.2.3.4:7777"].iter().enumerate() {
            let at = start + Duration::from_millis(30 * i as u64);
            view.type_search(text, at);
            tickets.extend(view.poll(at));
        }
        let last = start + Duration::from_millis(60);
        tickets.extend(view.poll(last + Duration::from_millis(100)));
        assert!(tickets.is_empty());
        assert_eq!(view.debounced_search(), "");

        tickets.extend(view.poll(last + Duration::from_millis(500)));
        tickets.extend(view.poll(last + Duration::from_millis(900)));
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].address, "1.2.3.4:7777");
    }

    #[test]
    fn stale_lookup_results_are_discarded() {
        let mut view = view_with(alpha_beta());
        let first = view.submit_search("1.1.1.1:7777").unwrap();
        let second = view.submit_search("2.2.2.2:7777").unwrap();
        assert!(second.seq > first.seq);

        let stale = record("Old", "Race", 1, "1.1.1.1");
        assert!(!view.resolve_lookup(&first, LookupOutcome::Found(stale)));
        assert_eq!(view.lookup_state().label(), "pending");

        assert!(view.resolve_lookup(&second, LookupOutcome::NotFound));
        assert_eq!(
            view.caption(),
            Caption::LookupNotFound { address: "2.2.2.2:7777".to_string() }
        );
        // A repeated delivery of the same result is ignored too.
        assert!(!view.resolve_lookup(&second, LookupOutcome::Failed));
    }

    #[test]
    fn leaving_address_search_supersedes_pending_lookup() {
        let mut view = view_with(alpha_beta());
        let ticket = view.submit_search("1.1.1.1:7777").unwrap();
        assert!(view.submit_search("beta").is_none());
        assert!(!view.resolve_lookup(&ticket, LookupOutcome::NotFound));
        assert_eq!(view.lookup_state(), &LookupState::Inactive);
        assert_eq!(names(&view.visible()), ["Beta"]);
    }

    #[test]
    fn failed_lookup_does_not_fall_back_to_filtering() {
        let mut view = view_with(alpha_beta());
        let ticket = view.submit_search("9.9.9.9:7777").unwrap();
        assert!(view.resolve_lookup(&ticket, LookupOutcome::Failed));
        assert!(view.visible().is_empty());
        assert_eq!(view.caption(), Caption::LookupFailed { address: "9.9.9.9:7777".to_string() });
        assert!(view.controls_enabled());
    }

    #[test]
    fn pagination_slices_and_resets() {
        let mut view = view_with(numbered(45));
        assert_eq!(view.total_pages(), 3);
        assert_eq!(view.set_page(3), 3);

        let page = view.page_items();
        assert_eq!(page.len(), 5);
        assert_eq!(page[0].name, "Server 41");
        assert_eq!(page[4].name, "Server 45");
        assert_eq!(view.caption(), Caption::Showing { from: 41, to: 45, total: 45, fetched: 45 });

        // "Server 1" plus "Server 10".."Server 19".
        view.submit_search("server 1");
        assert_eq!(view.visible().len(), 11);
        assert_eq!(view.current_page(), 1);

        view.submit_search("");
        view.set_page(3);
        assert!(view.set_gamemode_filter("race"));
        assert_eq!(view.current_page(), 1);
        assert_eq!(view.set_page(1), 1);
    }

    #[test]
    fn page_clamps_when_visible_set_shrinks() {
        let mut view = view_with(numbered(45));
        view.set_page(3);
        view.set_bulk_records(numbered(25));
        assert_eq!(view.current_page(), 2);
        view.set_bulk_records(Vec::new());
        assert_eq!(view.current_page(), 1);
        assert_eq!(view.set_page(0), 1);
        assert_eq!(view.set_page(99), 1);
    }

    #[test]
    fn empty_listing_reports_unavailable() {
        let view = view_with(Vec::new());
        assert!(view.visible().is_empty());
        assert_eq!(view.total_pages(), 0);
        assert_eq!(view.caption(), Caption::DirectoryUnavailable);
        assert_eq!(view.gamemodes(), ["Roleplay", "Freeroam"]);
    }

    #[test]
    fn filtered_to_empty_captions() {
        let mut view = view_with(alpha_beta());
        view.submit_search("nothing like this");
        assert_eq!(view.caption(), Caption::NoSearchMatches);

        view.submit_search("");
        view.set_gamemode_filter("Deathmatch");
        assert_eq!(view.caption(), Caption::NoGamemodeMatches);
    }

    #[test]
    fn full_listing_is_reported_as_capped() {
        let mut view = ListView::new(ViewSettings { listing_limit: 45, ..ViewSettings::default() });
        view.set_bulk_records(numbered(45));
        assert_eq!(view.caption(), Caption::ListingCapped { from: 1, to: 20, shown: 45 });
        view.set_gamemode_filter("race");
        assert!(matches!(view.caption(), Caption::Showing { total: 22, .. }));
    }

    #[test]
    fn gamemodes_are_unique_and_sorted() {
        let mut records = alpha_beta();
        records.push(record("Gamma", " Race ", 1, "3.3.3.3"));
        records.push(record("Delta", "", 1, "4.4.4.4"));
        let view = view_with(records);
        assert_eq!(view.gamemodes(), ["Race", "Roleplay"]);
    }

    #[test]
    fn snapshot_renders_rows() {
        let view = view_with(alpha_beta());
        let snapshot = view.snapshot();
        assert_eq!(snapshot.rows.len(), 2);
        assert_eq!(snapshot.rows[0].players, "5/100");
        assert_eq!(snapshot.rows[0].connect_uri, "samp://1.1.1.1:7777");
        assert_eq!(snapshot.rows[0].flag, region_flag("us"));
        assert_eq!(snapshot.lookup, "inactive");

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["rows"][0]["playerCount"], 5);
        assert_eq!(json["sortMode"], "default");
        assert_eq!(json["caption"]["kind"], "showing");
    }
}
