//! Built-in question and word banks.

/// `(question, options, index of the correct option)`
pub(crate) const TRIVIA: &[(&str, [&str; 4], usize)] = &[
    ("What is the largest planet in our solar system?", ["Mars", "Jupiter", "Saturn", "Neptune"], 1),
    ("How many continents are there?", ["5", "6", "7", "8"], 2),
    ("Which element has the chemical symbol O?", ["Gold", "Osmium", "Oxygen", "Iron"], 2),
    ("What is the capital of Japan?", ["Kyoto", "Osaka", "Seoul", "Tokyo"], 3),
    ("How many sides does a hexagon have?", ["6", "5", "8", "7"], 0),
    ("Which ocean is the largest?", ["Atlantic", "Indian", "Pacific", "Arctic"], 2),
    ("What is 12 x 12?", ["124", "144", "132", "156"], 1),
    ("Which planet is known as the Red Planet?", ["Venus", "Mercury", "Mars", "Jupiter"], 2),
    ("What is the fastest land animal?", ["Cheetah", "Lion", "Horse", "Pronghorn"], 0),
    ("How many minutes are in a day?", ["1240", "1440", "1400", "1640"], 1),
    ("Which gas do plants absorb from the air?", ["Oxygen", "Nitrogen", "Helium", "Carbon dioxide"], 3),
    ("What is the hardest natural substance?", ["Quartz", "Diamond", "Granite", "Iron"], 1),
];

/// Words for scramble and word-guess rounds. Upper case, no repeated
/// letter runs, so a shuffle can always differ from the original.
pub(crate) const WORDS: &[&str] = &[
    "STREAM", "PLANET", "GARDEN", "ROCKET", "CASTLE", "PUZZLE", "JUNGLE", "WIZARD",
    "FOREST", "BRIDGE", "CAMERA", "DRAGON", "GUITAR", "ISLAND", "KNIGHT", "LEGEND",
    "MARKET", "ORANGE", "PIRATE", "SILVER", "TROPHY", "VOYAGE", "WINTER", "ZIPPER",
];
