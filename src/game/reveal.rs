use serde::Serialize;

use crate::engine::Outcome;
use crate::session::RoundView;

/// Disclosure order once the reveal countdown has run out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum RevealStep {
    OwnMove = 1,
    OpponentMove = 2,
    Verdict = 3,
    Messages = 4,
    Health = 5,
}

impl RevealStep {
    pub const ORDER: [RevealStep; 5] = [
        RevealStep::OwnMove,
        RevealStep::OpponentMove,
        RevealStep::Verdict,
        RevealStep::Messages,
        RevealStep::Health,
    ];

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn next(self) -> Option<RevealStep> {
        match self {
            RevealStep::OwnMove => Some(RevealStep::OpponentMove),
            RevealStep::OpponentMove => Some(RevealStep::Verdict),
            RevealStep::Verdict => Some(RevealStep::Messages),
            RevealStep::Messages => Some(RevealStep::Health),
            RevealStep::Health => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RevealTick {
    /// Units left before the first disclosure.
    Countdown(u32),
    Disclosed(RevealStep),
    Done,
}

/// Drives the staged reveal: a short countdown, then one step per unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevealSequencer {
    countdown: u32,
    disclosed: Option<RevealStep>,
}

impl RevealSequencer {
    pub fn new(countdown_units: u32) -> Self {
        Self {
            countdown: countdown_units,
            disclosed: None,
        }
    }

    pub fn countdown(&self) -> u32 {
        self.countdown
    }

    pub fn disclosed(&self) -> Option<RevealStep> {
        self.disclosed
    }

    pub fn is_disclosed(&self, step: RevealStep) -> bool {
        self.disclosed.is_some_and(|d| d >= step)
    }

    pub fn is_complete(&self) -> bool {
        self.disclosed == Some(RevealStep::Health)
    }

    /// Advances by one unit.
    pub fn tick(&mut self) -> RevealTick {
        if self.countdown > 0 {
            self.countdown -= 1;
            return RevealTick::Countdown(self.countdown);
        }
        let next = match self.disclosed {
            None => Some(RevealStep::OwnMove),
            Some(step) => step.next(),
        };
        match next {
            Some(step) => {
                self.disclosed = Some(step);
                RevealTick::Disclosed(step)
            }
            None => RevealTick::Done,
        }
    }
}

/// Messages each seat gets to read for a resolved round: the winner's line
/// goes to both players, a tie shows both lines. Empty messages are omitted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DisclosedMessages {
    pub own: Option<String>,
    pub opponent: Option<String>,
}

pub fn disclosed_messages(round: &RoundView) -> DisclosedMessages {
    let non_empty = |msg: &str| (!msg.trim().is_empty()).then(|| msg.to_string());
    let (own, opponent) = match round.outcome {
        Outcome::Tie => (true, true),
        Outcome::Win => (true, false),
        Outcome::Lose => (false, true),
    };
    DisclosedMessages {
        own: own.then(|| non_empty(&round.own_message)).flatten(),
        opponent: opponent.then(|| non_empty(&round.opponent_message)).flatten(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Move;

    fn round(outcome: Outcome) -> RoundView {
        RoundView {
            round: 1,
            own_selection: Some(Move::Rock),
            opponent_selection: Some(Move::Paper),
            own_message: "mine".into(),
            opponent_message: "theirs".into(),
            outcome,
            own_health_before: 5,
            opponent_health_before: 5,
            own_health_after: 4,
            opponent_health_after: 5,
            game_over: false,
        }
    }

    #[test]
    fn steps_follow_the_countdown_in_order() {
        let mut seq = RevealSequencer::new(3);
        assert_eq!(seq.tick(), RevealTick::Countdown(2));
        assert_eq!(seq.tick(), RevealTick::Countdown(1));
        assert_eq!(seq.tick(), RevealTick::Countdown(0));
        assert!(seq.disclosed().is_none());

        for expected in RevealStep::ORDER {
            assert_eq!(seq.tick(), RevealTick::Disclosed(expected));
            assert!(seq.is_disclosed(expected));
        }
        assert!(seq.is_complete());
        assert_eq!(seq.tick(), RevealTick::Done);
    }

    #[test]
    fn later_steps_stay_hidden() {
        let mut seq = RevealSequencer::new(0);
        seq.tick();
        seq.tick();
        assert!(seq.is_disclosed(RevealStep::OwnMove));
        assert!(seq.is_disclosed(RevealStep::OpponentMove));
        assert!(!seq.is_disclosed(RevealStep::Verdict));
        assert_eq!(RevealStep::Health.index(), 5);
    }

    #[test]
    fn only_the_winner_speaks() {
        let lost = disclosed_messages(&round(Outcome::Lose));
        assert_eq!(lost.own, None);
        assert_eq!(lost.opponent.as_deref(), Some("theirs"));

        let won = disclosed_messages(&round(Outcome::Win));
        assert_eq!(won.own.as_deref(), Some("mine"));
        assert_eq!(won.opponent, None);

        let tie = disclosed_messages(&round(Outcome::Tie));
        assert!(tie.own.is_some() && tie.opponent.is_some());

        let mut silent = round(Outcome::Win);
        silent.own_message = "  ".into();
        assert_eq!(disclosed_messages(&silent), DisclosedMessages::default());
    }
}
