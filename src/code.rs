use rand::Rng;
use std::collections::HashSet;

/// Token alphabet for join codes. Codes are shown to players as a short
/// sequence of swipe directions, so the wire format is the tokens joined
/// with `-` (e.g. `up-left-left-down-right`).
pub const CODE_TOKENS: [&str; 4] = ["up", "down", "right", "left"];

/// Number of tokens per code. 4^5 = 1024 combinations; uniqueness is
/// checked against the full existing set, which is only viable while
/// code tables stay small.
pub const CODE_LEN: usize = 5;

/// Which namespace a code belongs to. Tournament join codes and user
/// friend codes are disjoint: a code only has to be unique within its
/// own kind.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CodeKind {
    Torneo,
    Amigo,
}

fn random_code<R: Rng>(rng: &mut R) -> String {
    let mut tokens = Vec::with_capacity(CODE_LEN);
    for _ in 0..CODE_LEN {
        tokens.push(CODE_TOKENS[rng.gen_range(0..CODE_TOKENS.len())]);
    }
    tokens.join("-")
}

/// Generate a code not contained in `existing`, regenerating on collision.
pub fn unique_code(existing: &HashSet<String>) -> String {
    let mut rng = rand::thread_rng();
    loop {
        let code = random_code(&mut rng);
        if !existing.contains(&code) {
            return code;
        }
    }
}
