use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type JulianDay = f64;

/// Julian day of the J2000.0 epoch (2000-01-01 12:00 TT).
pub const J2000: JulianDay = 2_451_545.0;

const DAYS_PER_CENTURY: f64 = 36_525.0;

/// General precession in longitude, degrees per Julian century.
const PRECESSION_PER_CENTURY: f64 = 1.396_971;

const EARTH_RADIUS_KM: f64 = 6_378.14;
const ASTRONOMICAL_UNIT_KM: f64 = 149_597_870.7;

const KEPLER_TOLERANCE: f64 = 1e-12;
const KEPLER_MAX_ITERATIONS: usize = 30;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Calendar {
    Gregorian,
    Julian,
}

#[repr(i32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Body {
    Sun = 0,
    Moon = 1,
    Mercury = 2,
    Venus = 3,
    Mars = 4,
    Jupiter = 5,
    Saturn = 6,
    Uranus = 7,
    Neptune = 8,
    Pluto = 9,
}

impl Body {
    pub const ALL: [Body; 10] = [
        Body::Sun,
        Body::Moon,
        Body::Mercury,
        Body::Venus,
        Body::Mars,
        Body::Jupiter,
        Body::Saturn,
        Body::Uranus,
        Body::Neptune,
        Body::Pluto,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Body::Sun => "Sun",
            Body::Moon => "Moon",
            Body::Mercury => "Mercury",
            Body::Venus => "Venus",
            Body::Mars => "Mars",
            Body::Jupiter => "Jupiter",
            Body::Saturn => "Saturn",
            Body::Uranus => "Uranus",
            Body::Neptune => "Neptune",
            Body::Pluto => "Pluto",
        }
    }
}

/// Geocentric ecliptic coordinates. Angles in degrees, distance in AU.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EclipticPosition {
    pub longitude: f64,
    pub latitude: f64,
    pub distance: f64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalculationError {
    #[error("julian day {julian_day} is outside the supported range {min}..={max}")]
    OutOfRange {
        julian_day: JulianDay,
        min: JulianDay,
        max: JulianDay,
    },
    #[error("julian day is not a finite number")]
    NonFinite,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EphemerisConfig {
    pub min_julian_day: JulianDay,
    pub max_julian_day: JulianDay,
    /// Rotate longitudes from the J2000 ecliptic to the mean ecliptic of date.
    pub precess_to_date: bool,
}

impl Default for EphemerisConfig {
    // 3000 BC .. AD 3000, the validity window of the element tables below.
    fn default() -> Self {
        EphemerisConfig {
            min_julian_day: J2000 - 50.0 * DAYS_PER_CENTURY,
            max_julian_day: J2000 + 10.0 * DAYS_PER_CENTURY,
            precess_to_date: true,
        }
    }
}

// ---------------------------
// ## Orbital Elements
// ---------------------------

/// Keplerian elements at J2000 plus rates per Julian century, in the order
/// a (AU), e, I, L, long. perihelion, long. ascending node (degrees).
struct OrbitalElements {
    base: [f64; 6],
    rate: [f64; 6],
    perturbation: Option<Perturbation>,
}

/// Extra mean anomaly terms for the outer planets: b*T^2 + c*cos(fT) + s*sin(fT).
struct Perturbation {
    b: f64,
    c: f64,
    s: f64,
    f: f64,
}

static MERCURY: OrbitalElements = OrbitalElements {
    base: [0.38709843, 0.20563661, 7.00559432, 252.25166724, 77.45771895, 48.33961819],
    rate: [0.00000000, 0.00002123, -0.00590158, 149472.67486623, 0.15940013, -0.12214182],
    perturbation: None,
};

static VENUS: OrbitalElements = OrbitalElements {
    base: [0.72332102, 0.00676399, 3.39777545, 181.97970850, 131.76755713, 76.67261496],
    rate: [-0.00000026, -0.00005107, 0.00043494, 58517.81560260, 0.05679648, -0.27274174],
    perturbation: None,
};

static EARTH_MOON_BARYCENTER: OrbitalElements = OrbitalElements {
    base: [1.00000018, 0.01673163, -0.00054346, 100.46691572, 102.93005885, -5.11260389],
    rate: [-0.00000003, -0.00003661, -0.01337178, 35999.37306329, 0.31795260, -0.24123856],
    perturbation: None,
};

static MARS: OrbitalElements = OrbitalElements {
    base: [1.52371243, 0.09336511, 1.85181869, -4.56813164, -23.91744784, 49.71320984],
    rate: [0.00000097, 0.00009149, -0.00724757, 19140.29934243, 0.45223625, -0.26852431],
    perturbation: None,
};

static JUPITER: OrbitalElements = OrbitalElements {
    base: [5.20248019, 0.04853590, 1.29861416, 34.33479152, 14.27495244, 100.29282654],
    rate: [-0.00002864, 0.00018026, -0.00322699, 3034.90371757, 0.18199196, 0.13024619],
    perturbation: Some(Perturbation {
        b: -0.00012452,
        c: 0.06064060,
        s: -0.35635438,
        f: 38.35125000,
    }),
};

static SATURN: OrbitalElements = OrbitalElements {
    base: [9.54149883, 0.05550825, 2.49424102, 50.07571329, 92.86136063, 113.63998702],
    rate: [-0.00003065, -0.00032044, 0.00451969, 1222.11494724, 0.54179478, -0.25015002],
    perturbation: Some(Perturbation {
        b: 0.00025899,
        c: -0.13434469,
        s: 0.87320147,
        f: 38.35125000,
    }),
};

static URANUS: OrbitalElements = OrbitalElements {
    base: [19.18797948, 0.04685740, 0.77298127, 314.20276625, 172.43404441, 73.96250215],
    rate: [-0.00020455, -0.00001550, -0.00180155, 428.49512595, 0.09266985, 0.05739699],
    perturbation: Some(Perturbation {
        b: 0.00058331,
        c: -0.97731848,
        s: 0.17689245,
        f: 7.67025000,
    }),
};

static NEPTUNE: OrbitalElements = OrbitalElements {
    base: [30.06952752, 0.00895439, 1.77005520, 304.22289287, 46.68158724, 131.78635853],
    rate: [0.00006447, 0.00000818, 0.00022400, 218.46515314, 0.01009938, -0.00606302],
    perturbation: Some(Perturbation {
        b: -0.00041348,
        c: 0.68346318,
        s: -0.10162547,
        f: 7.67025000,
    }),
};

static PLUTO: OrbitalElements = OrbitalElements {
    base: [39.48686035, 0.24885238, 17.14104260, 238.96535011, 224.09702598, 110.30167986],
    rate: [0.00449751, 0.00006016, 0.00000501, 145.18042903, -0.00968827, -0.00809981],
    perturbation: Some(Perturbation {
        b: -0.01262724,
        c: 0.0,
        s: 0.0,
        f: 0.0,
    }),
};

fn planet_elements(body: Body) -> Option<&'static OrbitalElements> {
    match body {
        Body::Mercury => Some(&MERCURY),
        Body::Venus => Some(&VENUS),
        Body::Mars => Some(&MARS),
        Body::Jupiter => Some(&JUPITER),
        Body::Saturn => Some(&SATURN),
        Body::Uranus => Some(&URANUS),
        Body::Neptune => Some(&NEPTUNE),
        Body::Pluto => Some(&PLUTO),
        Body::Sun | Body::Moon => None,
    }
}

impl OrbitalElements {
    /// Heliocentric rectangular coordinates in the J2000 ecliptic frame (AU).
    fn heliocentric(&self, t: f64) -> [f64; 3] {
        let mut el = [0.0; 6];
        for (i, value) in el.iter_mut().enumerate() {
            *value = self.base[i] + self.rate[i] * t;
        }
        let [a, e, inclination, mean_longitude, perihelion, node] = el;

        let mut mean_anomaly = mean_longitude - perihelion;
        if let Some(p) = &self.perturbation {
            let ft = (p.f * t).to_radians();
            mean_anomaly += p.b * t * t + p.c * ft.cos() + p.s * ft.sin();
        }
        let mean_anomaly = (mean_anomaly + 180.0).rem_euclid(360.0) - 180.0;

        let eccentric_anomaly = solve_kepler(mean_anomaly.to_radians(), e);
        let x_orbit = a * (eccentric_anomaly.cos() - e);
        let y_orbit = a * (1.0 - e * e).sqrt() * eccentric_anomaly.sin();

        let (sw, cw) = (perihelion - node).to_radians().sin_cos();
        let (so, co) = node.to_radians().sin_cos();
        let (si, ci) = inclination.to_radians().sin_cos();

        [
            (cw * co - sw * so * ci) * x_orbit + (-sw * co - cw * so * ci) * y_orbit,
            (cw * so + sw * co * ci) * x_orbit + (-sw * so + cw * co * ci) * y_orbit,
            (sw * si) * x_orbit + (cw * si) * y_orbit,
        ]
    }
}

fn solve_kepler(mean_anomaly: f64, eccentricity: f64) -> f64 {
    let mut eccentric_anomaly = mean_anomaly + eccentricity * mean_anomaly.sin();
    for _ in 0..KEPLER_MAX_ITERATIONS {
        let delta = (mean_anomaly - (eccentric_anomaly - eccentricity * eccentric_anomaly.sin()))
            / (1.0 - eccentricity * eccentric_anomaly.cos());
        eccentric_anomaly += delta;
        if delta.abs() < KEPLER_TOLERANCE {
            break;
        }
    }
    eccentric_anomaly
}

fn to_ecliptic(xyz: [f64; 3]) -> EclipticPosition {
    let [x, y, z] = xyz;
    let planar = x.hypot(y);
    EclipticPosition {
        longitude: normalize_degrees(y.atan2(x).to_degrees()),
        latitude: z.atan2(planar).to_degrees(),
        distance: (planar * planar + z * z).sqrt(),
    }
}

// Low-precision lunar series, referred to the mean equinox of date (~0.3 deg).
fn moon_position(t: f64) -> EclipticPosition {
    let sin = |deg: f64| deg.to_radians().sin();
    let cos = |deg: f64| deg.to_radians().cos();

    let longitude = 218.32 + 481_267.881 * t
        + 6.29 * sin(134.9 + 477_198.85 * t)
        - 1.27 * sin(259.2 - 413_335.38 * t)
        + 0.66 * sin(235.7 + 890_534.23 * t)
        + 0.21 * sin(269.9 + 954_397.70 * t)
        - 0.19 * sin(357.5 + 35_999.05 * t)
        - 0.11 * sin(186.6 + 966_404.05 * t);

    let latitude = 5.13 * sin(93.3 + 483_202.03 * t)
        + 0.28 * sin(228.2 + 960_400.87 * t)
        - 0.28 * sin(318.3 + 6_003.18 * t)
        - 0.17 * sin(217.6 - 407_332.20 * t);

    let parallax = 0.9508
        + 0.0518 * cos(134.9 + 477_198.85 * t)
        + 0.0095 * cos(259.2 - 413_335.38 * t)
        + 0.0078 * cos(235.7 + 890_534.23 * t)
        + 0.0028 * cos(269.9 + 954_397.70 * t);
    let distance_earth_radii = 1.0 / parallax.to_radians().sin();

    EclipticPosition {
        longitude: normalize_degrees(longitude),
        latitude,
        distance: distance_earth_radii * EARTH_RADIUS_KM / ASTRONOMICAL_UNIT_KM,
    }
}

// ---------------------------
// ## Ephemeris
// ---------------------------

#[derive(Debug, Clone, Default)]
pub struct Ephemeris {
    config: EphemerisConfig,
}

impl Ephemeris {
    pub fn new(config: EphemerisConfig) -> Self {
        Ephemeris { config }
    }

    pub fn config(&self) -> &EphemerisConfig {
        &self.config
    }

    /// Geocentric ecliptic position of `body` at `julian_day` (UT; delta T is ignored).
    pub fn calc_ut(
        &self,
        julian_day: JulianDay,
        body: Body,
    ) -> Result<EclipticPosition, CalculationError> {
        if !julian_day.is_finite() {
            return Err(CalculationError::NonFinite);
        }
        if julian_day < self.config.min_julian_day || julian_day > self.config.max_julian_day {
            return Err(CalculationError::OutOfRange {
                julian_day,
                min: self.config.min_julian_day,
                max: self.config.max_julian_day,
            });
        }

        let t = centuries_since_j2000(julian_day);
        let precession = PRECESSION_PER_CENTURY * t;

        let mut position = match body {
            Body::Moon => {
                let mut moon = moon_position(t);
                if !self.config.precess_to_date {
                    moon.longitude = normalize_degrees(moon.longitude - precession);
                }
                return Ok(moon);
            }
            _ => {
                let earth = EARTH_MOON_BARYCENTER.heliocentric(t);
                // the Sun sits at the heliocentric origin
                let target =
                    planet_elements(body).map_or([0.0; 3], |elements| elements.heliocentric(t));
                to_ecliptic([
                    target[0] - earth[0],
                    target[1] - earth[1],
                    target[2] - earth[2],
                ])
            }
        };

        if self.config.precess_to_date {
            position.longitude = normalize_degrees(position.longitude + precession);
        }
        Ok(position)
    }
}

// ---------------------------
// ## Utility Functions
// ---------------------------

pub fn julday(year: i32, month: u32, day: u32, hour: f64, calendar: Calendar) -> JulianDay {
    let (y, m) = if month <= 2 {
        (year - 1, month + 12)
    } else {
        (year, month)
    };
    let b = match calendar {
        Calendar::Gregorian => {
            let a = y.div_euclid(100);
            2 - a + a.div_euclid(4)
        }
        Calendar::Julian => 0,
    };
    (365.25 * f64::from(y + 4716)).floor()
        + (30.6001 * f64::from(m + 1)).floor()
        + f64::from(day)
        + hour / 24.0
        + f64::from(b)
        - 1524.5
}

pub fn centuries_since_j2000(julian_day: JulianDay) -> f64 {
    (julian_day - J2000) / DAYS_PER_CENTURY
}

/// Wraps an angle into [0, 360).
pub fn normalize_degrees(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}
