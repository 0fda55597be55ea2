//! Monte Carlo simulation of the Electoral College.
//!
//! Every trial draws each state independently with its win probability and
//! sums the electors of the states won by the tracked candidate.

use log::{debug, info, warn};
use rand::distributions::{Bernoulli, Distribution};
use rand::Rng;
use snafu::{ensure, OptionExt};

use crate::config::*;
use crate::predict::StateWinProbabilities;

/// Electoral votes needed to win the presidency.
pub const MAJORITY: u32 = 270;
pub const TOTAL_ELECTORS: u32 = 538;
/// The pseudo-state holding national polls. It has no electors.
pub const NATIONAL: &str = "National";

/// 2024 apportionment. Maine and Nebraska split their votes: the at-large
/// electors go with the state name, the districts are pseudo-states.
const APPORTIONMENT_2024: [(&str, u32); 56] = [
    ("Alabama", 9),
    ("Alaska", 3),
    ("Arizona", 11),
    ("Arkansas", 6),
    ("California", 54),
    ("Colorado", 10),
    ("Connecticut", 7),
    ("Delaware", 3),
    ("District of Columbia", 3),
    ("Florida", 30),
    ("Georgia", 16),
    ("Hawaii", 4),
    ("Idaho", 4),
    ("Illinois", 19),
    ("Indiana", 11),
    ("Iowa", 6),
    ("Kansas", 6),
    ("Kentucky", 8),
    ("Louisiana", 8),
    ("Maine", 2),
    ("ME-1", 1),
    ("ME-2", 1),
    ("Maryland", 10),
    ("Massachusetts", 11),
    ("Michigan", 15),
    ("Minnesota", 10),
    ("Mississippi", 6),
    ("Missouri", 10),
    ("Montana", 4),
    ("Nebraska", 2),
    ("NE-1", 1),
    ("NE-2", 1),
    ("NE-3", 1),
    ("Nevada", 6),
    ("New Hampshire", 4),
    ("New Jersey", 14),
    ("New Mexico", 5),
    ("New York", 28),
    ("North Carolina", 16),
    ("North Dakota", 3),
    ("Ohio", 17),
    ("Oklahoma", 7),
    ("Oregon", 8),
    ("Pennsylvania", 19),
    ("Rhode Island", 4),
    ("South Carolina", 9),
    ("South Dakota", 3),
    ("Tennessee", 11),
    ("Texas", 40),
    ("Utah", 6),
    ("Vermont", 3),
    ("Virginia", 13),
    ("Washington", 12),
    ("West Virginia", 4),
    ("Wisconsin", 10),
    ("Wyoming", 3),
];

/// Number of electors of each state.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ElectoralTable {
    entries: Vec<(String, u32)>,
}

impl ElectoralTable {
    pub fn standard_2024() -> ElectoralTable {
        ElectoralTable::from_entries(
            APPORTIONMENT_2024
                .iter()
                .map(|(s, e)| (s.to_string(), *e))
                .collect(),
        )
    }

    /// Builds a table from (state, electors) rows. National rows are dropped
    /// and a repeated state keeps its last value.
    pub fn from_entries(rows: Vec<(String, u32)>) -> ElectoralTable {
        let mut entries: Vec<(String, u32)> = Vec::with_capacity(rows.len());
        for (state, electors) in rows {
            if state == NATIONAL {
                continue;
            }
            match entries.iter_mut().find(|(s, _)| *s == state) {
                Some(e) => e.1 = electors,
                None => entries.push((state, electors)),
            }
        }
        ElectoralTable { entries }
    }

    pub fn electors(&self, state: &str) -> Option<u32> {
        self.entries
            .iter()
            .find(|(s, _)| s == state)
            .map(|(_, e)| *e)
    }

    pub fn total(&self) -> u32 {
        self.entries.iter().map(|(_, e)| e).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.entries.iter().map(|(s, e)| (s.as_str(), *e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The outcome of one simulated election.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct Trial {
    pub tracked_wins: bool,
    /// Electoral votes of the tracked candidate.
    pub points: u32,
}

#[derive(PartialEq, Debug, Clone)]
pub struct ElectionSimulation {
    pub trials: Vec<Trial>,
    /// Fraction of the trials won by the tracked candidate.
    pub win_fraction: f64,
}

impl ElectionSimulation {
    pub fn mean_points(&self) -> f64 {
        if self.trials.is_empty() {
            return 0.0;
        }
        self.trials.iter().map(|t| t.points as f64).sum::<f64>() / self.trials.len() as f64
    }
}

/// Runs `simulations` independent elections.
///
/// Every state with a probability must have electors. States of the table
/// without a probability never give their electors to the tracked candidate.
pub fn simulate_elections<R: Rng>(
    probabilities: &StateWinProbabilities,
    table: &ElectoralTable,
    simulations: usize,
    majority: u32,
    rng: &mut R,
) -> ForecastResult<ElectionSimulation> {
    ensure!(
        simulations > 0,
        InvalidSettingSnafu {
            name: "simulations",
            value: simulations.to_string(),
        }
    );
    let mut states: Vec<(Bernoulli, u32)> = Vec::with_capacity(probabilities.len());
    for (state, p) in probabilities.iter() {
        let electors = table.electors(state).context(UnknownStateSnafu { state })?;
        let dist = Bernoulli::new(p).ok().context(InvalidProbabilitySnafu {
            state,
            probability: p,
        })?;
        states.push((dist, electors));
    }
    let missing: Vec<&str> = table
        .iter()
        .filter(|(s, _)| !probabilities.contains(s))
        .map(|(s, _)| s)
        .collect();
    if !missing.is_empty() {
        warn!(
            "simulate_elections: {} state(s) without a probability: {:?}",
            missing.len(),
            missing
        );
    }

    let mut trials = Vec::with_capacity(simulations);
    let mut wins = 0usize;
    for _ in 0..simulations {
        let points: u32 = states
            .iter()
            .filter(|(dist, _)| dist.sample(rng))
            .map(|(_, electors)| electors)
            .sum();
        let tracked_wins = points >= majority;
        if tracked_wins {
            wins += 1;
        }
        trials.push(Trial {
            tracked_wins,
            points,
        });
    }
    let res = ElectionSimulation {
        trials,
        win_fraction: wins as f64 / simulations as f64,
    };
    debug!("simulate_elections: mean points {:.1}", res.mean_points());
    info!(
        "simulate_elections: tracked candidate wins {} of {} trials ({:.4})",
        wins, simulations, res.win_fraction
    );
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn three_states() -> (StateWinProbabilities, ElectoralTable) {
        let mut probs = StateWinProbabilities::new();
        probs.insert("A", 1.0);
        probs.insert("B", 0.0);
        probs.insert("C", 0.5);
        let table = ElectoralTable::from_entries(vec![
            ("A".to_string(), 60),
            ("B".to_string(), 200),
            ("C".to_string(), 278),
        ]);
        (probs, table)
    }

    #[test]
    fn standard_table_has_538_electors() {
        let table = ElectoralTable::standard_2024();
        assert_eq!(table.total(), TOTAL_ELECTORS);
        assert_eq!(table.electors("NE-2"), Some(1));
        assert_eq!(table.electors("California"), Some(54));
        assert_eq!(table.electors(NATIONAL), None);
    }

    #[test]
    fn three_state_scenario() {
        let (probs, table) = three_states();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let sim = simulate_elections(&probs, &table, 100_000, MAJORITY, &mut rng).unwrap();
        assert_eq!(sim.trials.len(), 100_000);
        assert!((sim.win_fraction - 0.5).abs() < 0.02, "{}", sim.win_fraction);
        for t in sim.trials.iter() {
            assert!(t.points == 60 || t.points == 338);
            assert_eq!(t.tracked_wins, t.points >= MAJORITY);
        }
    }

    #[test]
    fn winner_iff_majority() {
        let mut probs = StateWinProbabilities::new();
        probs.insert("A", 0.3);
        probs.insert("B", 0.6);
        probs.insert("C", 0.9);
        let table = ElectoralTable::from_entries(vec![
            ("A".to_string(), 100),
            ("B".to_string(), 170),
            ("C".to_string(), 268),
        ]);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        let sim = simulate_elections(&probs, &table, 5_000, MAJORITY, &mut rng).unwrap();
        let subset_sums = [0, 100, 170, 268, 270, 368, 438, 538];
        for t in sim.trials.iter() {
            assert_eq!(t.tracked_wins, t.points >= 270);
            assert!(subset_sums.contains(&t.points));
        }
        let wins = sim.trials.iter().filter(|t| t.tracked_wins).count();
        assert_eq!(sim.win_fraction, wins as f64 / 5_000.0);
    }

    #[test]
    fn unknown_state_is_fatal() {
        let (mut probs, table) = three_states();
        probs.insert("Atlantis", 0.5);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let res = simulate_elections(&probs, &table, 10, MAJORITY, &mut rng);
        assert!(matches!(res, Err(ForecastError::UnknownState { .. })));
    }

    #[test]
    fn out_of_range_probability_is_fatal() {
        let (mut probs, table) = three_states();
        probs.insert("C", 1.5);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let res = simulate_elections(&probs, &table, 10, MAJORITY, &mut rng);
        assert!(matches!(res, Err(ForecastError::InvalidProbability { .. })));
    }

    #[test]
    fn same_seed_same_trials() {
        let (probs, table) = three_states();
        let run = |seed| {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
            simulate_elections(&probs, &table, 200, MAJORITY, &mut rng).unwrap()
        };
        assert_eq!(run(9), run(9));
    }
}
