//! Stream type identifiers

/// Kind of data a stream carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StreamType {
    Depth,
    Color,
    Infrared,
    /// 3D point cloud derived from depth
    Point,
    Hand,
    /// Visualisation of the hand tracker's internal state
    DebugHandImage,
    /// Plugin defined type
    Custom(u32),
}

impl std::fmt::Display for StreamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamType::Depth => f.write_str("depth"),
            StreamType::Color => f.write_str("color"),
            StreamType::Infrared => f.write_str("infrared"),
            StreamType::Point => f.write_str("point"),
            StreamType::Hand => f.write_str("hand"),
            StreamType::DebugHandImage => f.write_str("debug_hand_image"),
            StreamType::Custom(id) => write!(f, "custom:{}", id),
        }
    }
}

/// Type and subtype of a stream, fixed at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamDescription {
    pub stream_type: StreamType,
    /// Distinguishes several streams of the same type in one set
    pub subtype: u32,
}

impl StreamDescription {
    pub const DEFAULT_SUBTYPE: u32 = 0;

    pub fn new(stream_type: StreamType, subtype: u32) -> Self {
        Self {
            stream_type,
            subtype,
        }
    }

    /// Description with the default subtype
    pub fn of(stream_type: StreamType) -> Self {
        Self::new(stream_type, Self::DEFAULT_SUBTYPE)
    }
}

impl std::fmt::Display for StreamDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.stream_type, self.subtype)
    }
}
