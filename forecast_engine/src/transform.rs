use chrono::Datelike;
use log::{debug, info, warn};
use snafu::ensure;

use std::collections::HashMap;

use crate::config::*;
use crate::stats;

/// Collapsed polling methodology. `ProbabilityPanel` is the reference level.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Methodology {
    OnlinePanel,
    LivePhone,
    ProbabilityPanel,
    AppPanel,
    Other,
}

impl Methodology {
    pub fn collapse(raw: Option<&str>) -> Methodology {
        match raw.map(|s| s.trim()) {
            Some("Online Panel") => Methodology::OnlinePanel,
            Some("Live Phone") => Methodology::LivePhone,
            Some("Probability Panel") => Methodology::ProbabilityPanel,
            Some("App Panel") => Methodology::AppPanel,
            _ => Methodology::Other,
        }
    }
}

/// Collapsed population. `Adults` is the reference level; the feed's `v`
/// (all voters) is folded into it.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Population {
    RegisteredVoters,
    LikelyVoters,
    Adults,
}

impl Population {
    pub fn collapse(raw: Option<&str>) -> Population {
        match raw.map(|s| s.trim().to_lowercase()).as_deref() {
            Some("rv") => Population::RegisteredVoters,
            Some("lv") => Population::LikelyVoters,
            _ => Population::Adults,
        }
    }
}

/// The covariates of the regression, in design matrix order.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Covariate {
    LivePhone,
    OnlinePanel,
    AppPanel,
    OtherMethod,
    Month,
    RepPoll,
    SampleSize,
    MultiCandidate,
    LikelyVoters,
    RegisteredVoters,
    Grade,
}

pub const NUM_COVARIATES: usize = 11;

impl Covariate {
    pub const ALL: [Covariate; NUM_COVARIATES] = [
        Covariate::LivePhone,
        Covariate::OnlinePanel,
        Covariate::AppPanel,
        Covariate::OtherMethod,
        Covariate::Month,
        Covariate::RepPoll,
        Covariate::SampleSize,
        Covariate::MultiCandidate,
        Covariate::LikelyVoters,
        Covariate::RegisteredVoters,
        Covariate::Grade,
    ];

    /// The name of the coefficient in the persisted prior table.
    pub fn prior_name(&self) -> &'static str {
        match self {
            Covariate::LivePhone => "Live Phone",
            Covariate::OnlinePanel => "Online Panel",
            Covariate::AppPanel => "App Panel",
            Covariate::OtherMethod => "Other",
            Covariate::Month => "month",
            Covariate::RepPoll => "rep_poll",
            Covariate::SampleSize => "sample_size",
            Covariate::MultiCandidate => "MultiCandidate",
            Covariate::LikelyVoters => "lv",
            Covariate::RegisteredVoters => "rv",
            Covariate::Grade => "grade",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// One row of the design matrix.
#[derive(PartialEq, Debug, Clone, Copy, Default)]
pub struct Covariates {
    pub live_phone: f64,
    pub online_panel: f64,
    pub app_panel: f64,
    pub other_method: f64,
    pub month: f64,
    pub rep_poll: f64,
    pub sample_size: f64,
    pub multi_candidate: f64,
    pub lv: f64,
    pub rv: f64,
    pub grade: f64,
}

impl Covariates {
    pub fn get(&self, c: Covariate) -> f64 {
        match c {
            Covariate::LivePhone => self.live_phone,
            Covariate::OnlinePanel => self.online_panel,
            Covariate::AppPanel => self.app_panel,
            Covariate::OtherMethod => self.other_method,
            Covariate::Month => self.month,
            Covariate::RepPoll => self.rep_poll,
            Covariate::SampleSize => self.sample_size,
            Covariate::MultiCandidate => self.multi_candidate,
            Covariate::LikelyVoters => self.lv,
            Covariate::RegisteredVoters => self.rv,
            Covariate::Grade => self.grade,
        }
    }

    /// Sum of coefficient_k * covariate_k.
    pub fn dot(&self, coefficients: &[f64]) -> f64 {
        Covariate::ALL
            .iter()
            .zip(coefficients.iter())
            .map(|(c, b)| self.get(*c) * b)
            .sum()
    }

    /// The covariates at which every state is predicted.
    pub fn today(max_month: f64, scenario: &TodayScenario) -> Covariates {
        Covariates {
            month: max_month,
            sample_size: scenario.sample_size,
            lv: 1.0,
            grade: 1.0,
            ..Covariates::default()
        }
    }

    fn one_hot(methodology: Methodology, population: Population) -> Covariates {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        Covariates {
            live_phone: flag(methodology == Methodology::LivePhone),
            online_panel: flag(methodology == Methodology::OnlinePanel),
            app_panel: flag(methodology == Methodology::AppPanel),
            other_method: flag(methodology == Methodology::Other),
            lv: flag(population == Population::LikelyVoters),
            rv: flag(population == Population::RegisteredVoters),
            ..Covariates::default()
        }
    }
}

/// Bijection between state names and dense ids, ordered by decreasing
/// number of polls.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct StateIndex {
    names: Vec<String>,
    ids: HashMap<String, usize>,
}

impl StateIndex {
    pub fn from_names(names: &[String]) -> StateIndex {
        let mut res = StateIndex::default();
        for name in names {
            if !res.ids.contains_key(name) {
                res.ids.insert(name.clone(), res.names.len());
                res.names.push(name.clone());
            }
        }
        res
    }

    /// Orders the states by descending frequency, ties by first appearance.
    fn by_frequency(states: &[&str]) -> StateIndex {
        let mut counts: Vec<(String, usize)> = Vec::new();
        let mut positions: HashMap<&str, usize> = HashMap::new();
        for s in states {
            match positions.get(s) {
                Some(pos) => counts[*pos].1 += 1,
                None => {
                    positions.insert(s, counts.len());
                    counts.push((s.to_string(), 1));
                }
            }
        }
        // The sort is stable: equal counts keep their order of appearance.
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        let names: Vec<String> = counts.into_iter().map(|(s, _)| s).collect();
        StateIndex::from_names(&names)
    }

    pub fn id(&self, name: &str) -> Option<usize> {
        self.ids.get(name).cloned()
    }

    pub fn name(&self, id: usize) -> Option<&str> {
        self.names.get(id).map(|s| s.as_str())
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// A question reduced to the tracked candidate's row, before imputation.
#[derive(PartialEq, Debug, Clone)]
pub struct CleanPoll {
    pub question_id: u64,
    pub state: String,
    pub methodology: Methodology,
    pub population: Population,
    pub sample_size: Option<f64>,
    pub numeric_grade: Option<f64>,
    /// Absolute month stamp (year * 12 + month).
    pub month_stamp: Option<i32>,
    pub rep_poll: bool,
    pub multi_candidate: bool,
    pub share: Option<f64>,
    pub opponent_share: Option<f64>,
}

/// The model-ready data: outcome vector, design matrix and state index.
#[derive(PartialEq, Debug, Clone)]
pub struct ModelData {
    pub outcome: Vec<f64>,
    pub rows: Vec<Covariates>,
    /// State id of each row.
    pub states: Vec<usize>,
    pub state_index: StateIndex,
}

impl ModelData {
    pub fn len(&self) -> usize {
        self.outcome.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcome.is_empty()
    }

    pub fn max_month(&self) -> f64 {
        self.rows.iter().map(|r| r.month).fold(0.0, f64::max)
    }

    /// Root mean square of each covariate column, for scaling proposals.
    pub fn column_scale(&self) -> [f64; NUM_COVARIATES] {
        let mut res = [0.0; NUM_COVARIATES];
        for c in Covariate::ALL {
            let squares: Vec<f64> = self.rows.iter().map(|r| r.get(c) * r.get(c)).collect();
            res[c.index()] = stats::mean(&squares).unwrap_or(0.0).sqrt();
        }
        res
    }
}

/// Splits the share of a two-candidate question so that it sums to 1.
pub fn rescale_pair(tracked_pct: f64, opponent_pct: f64) -> Option<(f64, f64)> {
    let total = tracked_pct + opponent_pct;
    if !total.is_finite() || total <= 0.0 || tracked_pct < 0.0 || opponent_pct < 0.0 {
        return None;
    }
    Some((tracked_pct / total, opponent_pct / total))
}

/// Maps the split electoral vote districts to their pseudo-state labels.
pub fn normalize_state(state: &str) -> String {
    let s = state.trim();
    for (prefix, code) in [("Nebraska CD-", "NE-"), ("Maine CD-", "ME-")] {
        if let Some(district) = s.strip_prefix(prefix) {
            return format!("{}{}", code, district);
        }
    }
    s.to_string()
}

/// Reduces the questions of the feed to one row per target-pair question.
pub fn clean_questions(polls: &[RawPoll], opts: &TransformOptions) -> ForecastResult<Vec<CleanPoll>> {
    let targets = opts.targets;
    // Group by question, in order of first appearance.
    let mut order: Vec<u64> = Vec::new();
    let mut groups: HashMap<u64, Vec<&RawPoll>> = HashMap::new();
    let mut dropped_no_state = 0;
    for p in polls.iter() {
        match p.state.as_deref() {
            Some(s) if !s.trim().is_empty() => {}
            _ => {
                dropped_no_state += 1;
                continue;
            }
        }
        groups
            .entry(p.question_id)
            .or_insert_with(|| {
                order.push(p.question_id);
                Vec::new()
            })
            .push(p);
    }
    if dropped_no_state > 0 {
        debug!("clean_questions: dropped {} rows without state", dropped_no_state);
    }

    let mut res: Vec<CleanPoll> = Vec::new();
    for qid in order.iter() {
        let group = &groups[qid];
        let responses = group.len();
        ensure!(
            responses >= 2,
            TooFewResponsesSnafu {
                question_id: *qid,
                responses
            }
        );
        let tracked: Vec<&&RawPoll> = group
            .iter()
            .filter(|p| p.candidate_id == targets.tracked)
            .collect();
        let opponent: Vec<&&RawPoll> = group
            .iter()
            .filter(|p| p.candidate_id == targets.opponent)
            .collect();
        for (cid, rows) in [(targets.tracked, &tracked), (targets.opponent, &opponent)] {
            ensure!(
                rows.len() <= 1,
                DuplicateCandidateSnafu {
                    question_id: *qid,
                    candidate_id: cid,
                    count: rows.len()
                }
            );
        }
        let (t, o) = match (tracked.first(), opponent.first()) {
            (Some(t), Some(o)) => (**t, **o),
            _ => {
                debug!("clean_questions: question {} is another match-up, skipping", qid);
                continue;
            }
        };
        ensure!(
            responses == 2 || opts.multi_candidate == MultiCandidateMode::Flag,
            MultiCandidateQuestionSnafu {
                question_id: *qid,
                responses
            }
        );

        let shares = match (t.pct, o.pct) {
            (Some(tp), Some(op)) => rescale_pair(tp, op),
            _ => None,
        };
        let state = t.state.as_deref().map(normalize_state).unwrap_or_default();
        res.push(CleanPoll {
            question_id: *qid,
            state,
            methodology: Methodology::collapse(t.methodology.as_deref()),
            population: Population::collapse(t.population.as_deref()),
            sample_size: t.sample_size,
            numeric_grade: t.numeric_grade,
            month_stamp: t.end_date.map(|d| d.year() * 12 + d.month0() as i32),
            rep_poll: t.partisan.as_deref() == Some(opts.partisan_code.as_str()),
            multi_candidate: responses > 2,
            share: shares.map(|s| s.0),
            opponent_share: shares.map(|s| s.1),
        });
    }
    info!(
        "clean_questions: kept {} of {} questions",
        res.len(),
        order.len()
    );
    Ok(res)
}

/// Transforms the raw feed into the data consumed by the model.
pub fn transform_polls(polls: &[RawPoll], opts: &TransformOptions) -> ForecastResult<ModelData> {
    let cleaned = clean_questions(polls, opts)?;
    let total = cleaned.len();
    let cleaned: Vec<CleanPoll> = cleaned.into_iter().filter(|p| p.share.is_some()).collect();
    if cleaned.len() < total {
        warn!(
            "transform_polls: dropped {} questions without a usable share",
            total - cleaned.len()
        );
    }
    ensure!(!cleaned.is_empty(), EmptyPollSetSnafu {});

    // Grades: median imputation, then binarization.
    let grades: Vec<f64> = cleaned.iter().filter_map(|p| p.numeric_grade).collect();
    let median_grade = stats::median(&grades);
    if median_grade.is_none() {
        warn!("transform_polls: no pollster grade in the feed, all polls flagged as low grade");
    }
    let first_month = cleaned.iter().filter_map(|p| p.month_stamp).min();

    let mut partial: Vec<(Covariates, Option<f64>, Option<f64>)> = Vec::new();
    for p in cleaned.iter() {
        let mut row = Covariates::one_hot(p.methodology, p.population);
        row.rep_poll = if p.rep_poll { 1.0 } else { 0.0 };
        row.multi_candidate = if p.multi_candidate { 1.0 } else { 0.0 };
        row.grade = match p.numeric_grade.or(median_grade) {
            Some(g) if g >= opts.grade_cutoff => 1.0,
            _ => 0.0,
        };
        let month = match (p.month_stamp, first_month) {
            (Some(m), Some(first)) => Some((m - first) as f64),
            _ => None,
        };
        partial.push((row, p.sample_size, month));
    }

    // Column mean imputation for the remaining numeric covariates.
    let sizes: Vec<f64> = partial.iter().filter_map(|x| x.1).collect();
    let months: Vec<f64> = partial.iter().filter_map(|x| x.2).collect();
    let mean_size = stats::mean(&sizes).unwrap_or(0.0);
    let mean_month = stats::mean(&months).unwrap_or(0.0);
    if sizes.len() < partial.len() || months.len() < partial.len() {
        debug!(
            "transform_polls: imputing {} sample sizes with {:.1}, {} months with {:.2}",
            partial.len() - sizes.len(),
            mean_size,
            partial.len() - months.len(),
            mean_month
        );
    }
    let rows: Vec<Covariates> = partial
        .into_iter()
        .map(|(mut row, size, month)| {
            row.sample_size = size.unwrap_or(mean_size);
            row.month = month.unwrap_or(mean_month);
            row
        })
        .collect();

    let state_names: Vec<&str> = cleaned.iter().map(|p| p.state.as_str()).collect();
    let state_index = StateIndex::by_frequency(&state_names);
    let states: Vec<usize> = state_names
        .iter()
        .filter_map(|s| state_index.id(s))
        .collect();
    let outcome: Vec<f64> = cleaned.iter().filter_map(|p| p.share).collect();

    info!(
        "transform_polls: {} polls over {} states",
        outcome.len(),
        state_index.len()
    );
    Ok(ModelData {
        outcome,
        rows,
        states,
        state_index,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::NaiveDate;

    pub const TRACKED: u64 = 16651;
    pub const OPPONENT: u64 = 16661;

    pub fn options() -> TransformOptions {
        RunSettings::default().transform
    }

    pub fn poll(qid: u64, cid: u64, state: &str, pct: f64) -> RawPoll {
        RawPoll {
            question_id: qid,
            candidate_id: cid,
            state: Some(state.to_string()),
            methodology: Some("Online Panel".to_string()),
            population: Some("lv".to_string()),
            sample_size: Some(800.0),
            end_date: NaiveDate::from_ymd_opt(2024, 7, 15),
            numeric_grade: Some(2.5),
            partisan: None,
            pct: Some(pct),
        }
    }

    pub fn question(qid: u64, state: &str, tracked: f64, opponent: f64) -> Vec<RawPoll> {
        vec![
            poll(qid, TRACKED, state, tracked),
            poll(qid, OPPONENT, state, opponent),
        ]
    }

    /// `per_state` questions for each (state, tracked share) pair, cycling
    /// through methodologies, populations, sizes, grades and dates.
    pub fn varied_polls(states: &[(&str, f64)], per_state: usize) -> Vec<RawPoll> {
        const METHODS: [&str; 5] = [
            "Online Panel",
            "Live Phone",
            "Probability Panel",
            "App Panel",
            "IVR/Text",
        ];
        const POPULATIONS: [&str; 4] = ["lv", "rv", "a", "lv"];
        const GRADES: [f64; 4] = [3.0, 2.1, 1.5, 2.8];
        let start = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let mut res = Vec::new();
        let mut qid = 0;
        for (state, share) in states.iter() {
            for k in 0..per_state {
                qid += 1;
                let tracked = share + ((k * 7) % 5) as f64 * 0.8 - 1.6;
                for (cid, pct) in [(TRACKED, tracked), (OPPONENT, 100.0 - tracked)] {
                    let mut p = poll(qid, cid, state, pct);
                    p.methodology = Some(METHODS[(k + qid as usize) % METHODS.len()].to_string());
                    p.population = Some(POPULATIONS[k % POPULATIONS.len()].to_string());
                    p.sample_size = Some(400.0 + 150.0 * (k % 7) as f64);
                    p.numeric_grade = Some(GRADES[(k / 2) % GRADES.len()]);
                    p.end_date = Some(start + chrono::Duration::days(9 * k as i64));
                    p.partisan = if k % 6 == 0 { Some("REP".to_string()) } else { None };
                    res.push(p);
                }
            }
        }
        res
    }

    #[test]
    fn shares_sum_to_one() {
        let mut polls = question(1, "Ohio", 48.0, 44.0);
        polls.extend(question(2, "Ohio", 45.5, 45.5));
        polls.extend(question(3, "Georgia", 47.0, 49.0));
        let cleaned = clean_questions(&polls, &options()).unwrap();
        assert_eq!(cleaned.len(), 3);
        for p in cleaned.iter() {
            let total = p.share.unwrap() + p.opponent_share.unwrap();
            assert!((total - 1.0).abs() < 1e-9);
        }
        assert!((cleaned[0].share.unwrap() - 48.0 / 92.0).abs() < 1e-12);
    }

    #[test]
    fn multi_candidate_is_flagged() {
        let mut polls = question(1, "Ohio", 45.0, 42.0);
        polls.push(poll(1, 99, "Ohio", 6.0));
        polls.extend(question(2, "Ohio", 45.0, 42.0));
        let data = transform_polls(&polls, &options()).unwrap();
        assert_eq!(data.rows[0].multi_candidate, 1.0);
        assert_eq!(data.rows[1].multi_candidate, 0.0);
        // The third candidate does not enter the rescaling.
        assert!((data.outcome[0] - 45.0 / 87.0).abs() < 1e-12);
    }

    #[test]
    fn multi_candidate_is_rejected() {
        let mut polls = question(1, "Ohio", 45.0, 42.0);
        polls.push(poll(1, 99, "Ohio", 6.0));
        let mut opts = options();
        opts.multi_candidate = MultiCandidateMode::Reject;
        let res = transform_polls(&polls, &opts);
        assert!(matches!(
            res,
            Err(ForecastError::MultiCandidateQuestion {
                question_id: 1,
                responses: 3
            })
        ));
    }

    #[test]
    fn single_response_is_fatal() {
        let mut polls = question(1, "Ohio", 45.0, 42.0);
        polls.push(poll(2, TRACKED, "Ohio", 45.0));
        let res = transform_polls(&polls, &options());
        assert!(matches!(
            res,
            Err(ForecastError::TooFewResponses {
                question_id: 2,
                responses: 1
            })
        ));
    }

    #[test]
    fn duplicate_candidate_is_fatal() {
        let mut polls = question(1, "Ohio", 45.0, 42.0);
        polls.push(poll(1, TRACKED, "Ohio", 3.0));
        let res = transform_polls(&polls, &options());
        assert!(matches!(res, Err(ForecastError::DuplicateCandidate { .. })));
    }

    #[test]
    fn other_matchups_are_skipped() {
        let mut polls = question(1, "Ohio", 45.0, 42.0);
        polls.push(poll(2, TRACKED, "Ohio", 45.0));
        polls.push(poll(2, 12345, "Ohio", 40.0));
        let data = transform_polls(&polls, &options()).unwrap();
        assert_eq!(data.len(), 1);
    }

    #[test]
    fn missing_state_rows_are_dropped() {
        let mut polls = question(1, "Ohio", 45.0, 42.0);
        let mut national = question(2, "", 50.0, 45.0);
        for p in national.iter_mut() {
            p.state = None;
        }
        polls.extend(national);
        let data = transform_polls(&polls, &options()).unwrap();
        assert_eq!(data.len(), 1);
    }

    #[test]
    fn grades_are_imputed_and_binarized() {
        let mut polls = question(1, "Ohio", 45.0, 42.0);
        polls.extend(question(2, "Ohio", 45.0, 42.0));
        polls.extend(question(3, "Ohio", 45.0, 42.0));
        polls[0].numeric_grade = Some(1.5);
        polls[2].numeric_grade = Some(2.5);
        polls[4].numeric_grade = None;
        // Median of [1.5, 2.5] is 2.0, which passes the cutoff.
        let data = transform_polls(&polls, &options()).unwrap();
        assert_eq!(data.rows[0].grade, 0.0);
        assert_eq!(data.rows[1].grade, 1.0);
        assert_eq!(data.rows[2].grade, 1.0);
    }

    #[test]
    fn months_start_at_zero() {
        let mut polls = question(1, "Ohio", 45.0, 42.0);
        polls.extend(question(2, "Ohio", 45.0, 42.0));
        polls.extend(question(3, "Ohio", 45.0, 42.0));
        polls[0].end_date = NaiveDate::from_ymd_opt(2023, 11, 3);
        polls[2].end_date = NaiveDate::from_ymd_opt(2024, 2, 28);
        polls[4].end_date = None;
        let data = transform_polls(&polls, &options()).unwrap();
        assert_eq!(data.rows[0].month, 0.0);
        assert_eq!(data.rows[1].month, 3.0);
        // Missing month takes the column mean.
        assert_eq!(data.rows[2].month, 1.5);
        assert_eq!(data.max_month(), 3.0);
    }

    #[test]
    fn one_hot_drops_reference_levels() {
        let mut polls = question(1, "Ohio", 45.0, 42.0);
        polls.extend(question(2, "Ohio", 45.0, 42.0));
        polls[0].methodology = Some("Probability Panel".to_string());
        polls[0].population = Some("a".to_string());
        polls[2].methodology = Some("IVR/Text".to_string());
        polls[2].population = Some("rv".to_string());
        let data = transform_polls(&polls, &options()).unwrap();
        let r0 = data.rows[0];
        assert_eq!(
            (r0.live_phone, r0.online_panel, r0.app_panel, r0.other_method, r0.lv, r0.rv),
            (0.0, 0.0, 0.0, 0.0, 0.0, 0.0)
        );
        assert_eq!(data.rows[1].other_method, 1.0);
        assert_eq!(data.rows[1].rv, 1.0);
    }

    #[test]
    fn partisan_and_sample_size_imputation() {
        let mut polls = question(1, "Ohio", 45.0, 42.0);
        polls.extend(question(2, "Ohio", 45.0, 42.0));
        polls[0].partisan = Some("REP".to_string());
        polls[0].sample_size = Some(1000.0);
        polls[2].sample_size = None;
        let data = transform_polls(&polls, &options()).unwrap();
        assert_eq!(data.rows[0].rep_poll, 1.0);
        assert_eq!(data.rows[1].rep_poll, 0.0);
        assert_eq!(data.rows[1].sample_size, 1000.0);
    }

    #[test]
    fn states_are_indexed_by_frequency() {
        let mut polls = question(1, "Ohio", 45.0, 42.0);
        polls.extend(question(2, "Nebraska CD-2", 45.0, 42.0));
        polls.extend(question(3, "Nebraska CD-2", 45.0, 42.0));
        polls.extend(question(4, "Georgia", 45.0, 42.0));
        let data = transform_polls(&polls, &options()).unwrap();
        assert_eq!(data.state_index.names(), ["NE-2", "Ohio", "Georgia"]);
        assert_eq!(data.states, vec![1, 0, 0, 2]);
    }

    #[test]
    fn missing_share_is_dropped() {
        let mut polls = question(1, "Ohio", 45.0, 42.0);
        polls.extend(question(2, "Ohio", 45.0, 42.0));
        polls[3].pct = None;
        let data = transform_polls(&polls, &options()).unwrap();
        assert_eq!(data.len(), 1);

        let mut empty = question(1, "Ohio", 45.0, 42.0);
        empty[0].pct = None;
        assert!(matches!(
            transform_polls(&empty, &options()),
            Err(ForecastError::EmptyPollSet {})
        ));
    }
}
