use super::types::{Health, Move, Outcome, Resolution, MAX_HEALTH};

fn damage(health: Health) -> Health {
    health.min(MAX_HEALTH).saturating_sub(1)
}

/// A side at 1 HP is not reduced by a tie.
fn tie_damage(health: Health) -> Health {
    let health = health.min(MAX_HEALTH);
    if health == 1 {
        health
    } else {
        health.saturating_sub(1)
    }
}

fn verdict(self_move: Option<Move>, opp_move: Option<Move>) -> Outcome {
    match (self_move, opp_move) {
        (None, None) => Outcome::Tie,
        (None, Some(_)) => Outcome::Lose,
        (Some(_), None) => Outcome::Win,
        (Some(a), Some(b)) if a == b => Outcome::Tie,
        (Some(a), Some(b)) if a.beats() == b => Outcome::Win,
        (Some(_), Some(_)) => Outcome::Lose,
    }
}

/// Resolves one round. Pure and total: the same moves and starting healths
/// always give the same result, and healths never grow.
///
/// A missing selection forfeits the round. When both sides are missing the
/// round is a double forfeit: verdict `Tie`, both sides take one damage and
/// the tie floor does not apply.
pub fn resolve(
    self_move: Option<Move>,
    opp_move: Option<Move>,
    self_health: Health,
    opp_health: Health,
) -> Resolution {
    let outcome = verdict(self_move, opp_move);
    let (self_health, opp_health) = match (outcome, self_move, opp_move) {
        (Outcome::Tie, None, None) => (damage(self_health), damage(opp_health)),
        (Outcome::Tie, _, _) => (tie_damage(self_health), tie_damage(opp_health)),
        (Outcome::Win, _, _) => (self_health.min(MAX_HEALTH), damage(opp_health)),
        (Outcome::Lose, _, _) => (damage(self_health), opp_health.min(MAX_HEALTH)),
    };

    Resolution {
        outcome,
        self_health,
        opp_health,
        game_over: self_health == 0 || opp_health == 0,
    }
}
