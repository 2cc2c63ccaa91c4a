pub mod direction;
pub mod geometry;
pub mod matcher;
pub mod road;
pub mod road_tree;

pub use direction::{DirectionLabel, DirectionResolver, DirectionResult, Resolution};
pub use geometry::SnappedPoint;
pub use matcher::{BearingSource, MatchResult, MatchSettings, MovementBearing, RoadMatcher};
pub use road::{RoadDirection, RoadFeature, RoadId};
pub use road_tree::{BoundingBox, RoadNetworkIndex};
