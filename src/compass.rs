/// Points of the 16-point compass rose, clockwise from north. Coarser roses
/// (4 or 8 points) use every 4th or 2nd entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    N,   // north
    NNE, // north-northeast
    NE,  // northeast
    ENE, // east-northeast
    E,   // east
    ESE, // east-southeast
    SE,  // southeast
    SSE, // south-southeast
    S,   // south
    SSW, // south-southwest
    SW,  // southwest
    WSW, // west-southwest
    W,   // west
    WNW, // west-northwest
    NW,  // northwest
    NNW, // north-northwest
}

const ROSE: [Direction; 16] = [
    Direction::N,
    Direction::NNE,
    Direction::NE,
    Direction::ENE,
    Direction::E,
    Direction::ESE,
    Direction::SE,
    Direction::SSE,
    Direction::S,
    Direction::SSW,
    Direction::SW,
    Direction::WSW,
    Direction::W,
    Direction::WNW,
    Direction::NW,
    Direction::NNW,
];

/// Resolution of the compass rose used for labels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CompassPoints {
    Four,
    #[default]
    Eight,
    Sixteen,
}

impl CompassPoints {
    pub fn count(self) -> usize {
        match self {
            CompassPoints::Four => 4,
            CompassPoints::Eight => 8,
            CompassPoints::Sixteen => 16,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.abbreviation())
    }
}

impl Direction {
    /// Nearest direction on a rose with `points` sectors. Each sector is
    /// centered on its direction, so north covers `[-step/2, step/2)`.
    pub fn from_heading(heading: f64, points: CompassPoints) -> Self {
        let normalized = crate::heading::normalize_degrees(heading);
        let count = points.count();
        let step = 360.0 / count as f64;
        let sector = ((normalized + step / 2.0) / step) as usize % count;
        ROSE[sector * (16 / count)]
    }

    /// Spelled-out direction, e.g. "north-northeast" for `NNE`.
    pub fn name(&self) -> String {
        let word = |c: char| match c {
            'N' => "north",
            'E' => "east",
            'S' => "south",
            _ => "west",
        };
        let words: Vec<&str> = self.abbreviation().chars().map(word).collect();
        match words.as_slice() {
            [primary, rest @ ..] if rest.len() == 2 => format!("{primary}-{}", rest.concat()),
            _ => words.concat(),
        }
    }

    pub fn abbreviation(&self) -> &str {
        match self {
            Direction::N => "N",
            Direction::NNE => "NNE",
            Direction::NE => "NE",
            Direction::ENE => "ENE",
            Direction::E => "E",
            Direction::ESE => "ESE",
            Direction::SE => "SE",
            Direction::SSE => "SSE",
            Direction::S => "S",
            Direction::SSW => "SSW",
            Direction::SW => "SW",
            Direction::WSW => "WSW",
            Direction::W => "W",
            Direction::WNW => "WNW",
            Direction::NW => "NW",
            Direction::NNW => "NNW",
        }
    }
}
