use chrono::{DateTime, Utc};

/// Number of fixed-point units per degree.
pub const COORDINATE_PRECISION: i32 = 10_000_000;

/// A point on the map stored in 1e-7 degree units.
#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[archive(check_bytes)]
pub struct Location {
    pub x: i32,
    pub y: i32,
}

impl Location {
    pub fn from_units(x: i32, y: i32) -> Self {
        Location { x, y }
    }

    /// Rounds half away from zero onto the fixed-point grid.
    pub fn from_degrees(lon: f64, lat: f64) -> Self {
        Location {
            x: Self::to_units(lon),
            y: Self::to_units(lat),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn to_units(degrees: f64) -> i32 {
        (degrees * f64::from(COORDINATE_PRECISION)).round() as i32
    }

    pub fn lon(&self) -> f64 {
        f64::from(self.x) / f64::from(COORDINATE_PRECISION)
    }

    pub fn lat(&self) -> f64 {
        f64::from(self.y) / f64::from(COORDINATE_PRECISION)
    }
}

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[archive(check_bytes)]
pub struct Bounds {
    pub bottom_left: Location,
    pub top_right: Location,
}

impl Bounds {
    pub fn new(bottom_left: Location, top_right: Location) -> Self {
        Bounds {
            bottom_left,
            top_right,
        }
    }

    pub fn from_degrees(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Bounds {
            bottom_left: Location::from_degrees(min_lon, min_lat),
            top_right: Location::from_degrees(max_lon, max_lat),
        }
    }
}

/// Seconds since the Unix epoch, zero meaning "not set".
#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[archive(check_bytes)]
pub struct Timestamp(pub u32);

impl Timestamp {
    pub fn is_set(self) -> bool {
        self.0 != 0
    }

    pub fn to_iso(self) -> String {
        DateTime::<Utc>::from_timestamp(i64::from(self.0), 0)
            .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
            .unwrap_or_default()
    }
}

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[archive(check_bytes)]
pub enum ItemType {
    Node,
    Way,
    Relation,
    Changeset,
}

impl ItemType {
    pub fn name(self) -> &'static str {
        match self {
            ItemType::Node => "node",
            ItemType::Way => "way",
            ItemType::Relation => "relation",
            ItemType::Changeset => "changeset",
        }
    }
}

/// Tag keys and values are raw bytes, they may not be valid UTF-8.
#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, PartialEq, Eq)]
#[archive(check_bytes)]
pub struct Tag {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl Tag {
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Tag {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Attributes shared by nodes, ways and relations.
#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, PartialEq, Eq)]
#[archive(check_bytes)]
pub struct ObjectMeta {
    pub id: i64,
    /// 0 means no version.
    pub version: u32,
    /// 0 means no changeset.
    pub changeset: u32,
    /// 0 means anonymous, `user` is ignored in that case.
    pub uid: u32,
    pub user: Vec<u8>,
    pub timestamp: Timestamp,
    pub visible: bool,
}

impl ObjectMeta {
    pub fn new(id: i64) -> Self {
        ObjectMeta {
            id,
            version: 0,
            changeset: 0,
            uid: 0,
            user: Vec::new(),
            timestamp: Timestamp::default(),
            visible: true,
        }
    }

    pub fn user_is_anonymous(&self) -> bool {
        self.uid == 0
    }
}

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, PartialEq, Eq)]
#[archive(check_bytes)]
pub struct Node {
    pub meta: ObjectMeta,
    pub location: Option<Location>,
    pub tags: Vec<Tag>,
}

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, PartialEq, Eq)]
#[archive(check_bytes)]
pub struct Way {
    pub meta: ObjectMeta,
    pub nodes: Vec<i64>,
    pub tags: Vec<Tag>,
}

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, PartialEq, Eq)]
#[archive(check_bytes)]
pub struct Member {
    pub item_type: ItemType,
    pub member_ref: i64,
    pub role: Vec<u8>,
}

impl Member {
    pub fn new(item_type: ItemType, member_ref: i64, role: impl Into<Vec<u8>>) -> Self {
        Member {
            item_type,
            member_ref,
            role: role.into(),
        }
    }
}

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, PartialEq, Eq)]
#[archive(check_bytes)]
pub struct Relation {
    pub meta: ObjectMeta,
    pub members: Vec<Member>,
    pub tags: Vec<Tag>,
}

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, PartialEq, Eq)]
#[archive(check_bytes)]
pub struct ChangesetComment {
    pub date: Timestamp,
    pub uid: u32,
    pub user: Vec<u8>,
    pub text: Vec<u8>,
}

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, PartialEq, Eq)]
#[archive(check_bytes)]
pub struct Changeset {
    pub id: u32,
    pub created_at: Timestamp,
    pub closed_at: Timestamp,
    pub uid: u32,
    pub user: Vec<u8>,
    pub bounds: Option<Bounds>,
    pub num_changes: u32,
    pub num_comments: u32,
    pub tags: Vec<Tag>,
    pub discussion: Vec<ChangesetComment>,
}

impl Changeset {
    pub fn new(id: u32) -> Self {
        Changeset {
            id,
            created_at: Timestamp::default(),
            closed_at: Timestamp::default(),
            uid: 0,
            user: Vec::new(),
            bounds: None,
            num_changes: 0,
            num_comments: 0,
            tags: Vec::new(),
            discussion: Vec::new(),
        }
    }

    pub fn user_is_anonymous(&self) -> bool {
        self.uid == 0
    }
}

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, PartialEq, Eq)]
#[archive(check_bytes)]
pub enum Entity {
    Node(Node),
    Way(Way),
    Relation(Relation),
    Changeset(Changeset),
}

impl From<Node> for Entity {
    fn from(value: Node) -> Self {
        Entity::Node(value)
    }
}

impl From<Way> for Entity {
    fn from(value: Way) -> Self {
        Entity::Way(value)
    }
}

impl From<Relation> for Entity {
    fn from(value: Relation) -> Self {
        Entity::Relation(value)
    }
}

impl From<Changeset> for Entity {
    fn from(value: Changeset) -> Self {
        Entity::Changeset(value)
    }
}
