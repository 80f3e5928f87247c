/// Every territory on the board, with its neighbours.
pub const ADJACENCY: [(&str, &[&str]); 6] = [
    ("americas", &["europe", "africa", "asia", "antarctica"]),
    ("europe", &["americas", "africa", "asia"]),
    ("africa", &["americas", "europe", "asia", "antarctica"]),
    ("asia", &["americas", "europe", "africa", "australia"]),
    ("australia", &["asia", "antarctica"]),
    ("antarctica", &["americas", "africa", "australia"]),
];

pub fn territory_names() -> impl Iterator<Item = &'static str> {
    ADJACENCY.iter().map(|(name, _)| *name)
}

pub fn is_territory(name: &str) -> bool {
    neighbors(name).is_some()
}

pub fn neighbors(name: &str) -> Option<&'static [&'static str]> {
    ADJACENCY
        .iter()
        .find(|(territory, _)| *territory == name)
        .map(|(_, neighbors)| *neighbors)
}

pub fn are_adjacent(from: &str, to: &str) -> bool {
    neighbors(from).is_some_and(|neighbors| neighbors.iter().any(|neighbor| *neighbor == to))
}
