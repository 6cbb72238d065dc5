//! Primitive topology of a layer's shared mesh.

/// How the index buffer of a layer is assembled into primitives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    /// Individual points.
    Points,
    /// Independent line segments.
    Lines,
    /// Closed polyline.
    LineLoop,
    /// Open polyline.
    LineStrip,
    /// Independent triangles.
    #[default]
    Triangles,
    /// Triangle strip.
    TriangleStrip,
    /// Triangle fan.
    TriangleFan,
}

impl PrimitiveKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Points,
        Self::Lines,
        Self::LineLoop,
        Self::LineStrip,
        Self::Triangles,
        Self::TriangleStrip,
        Self::TriangleFan,
    ];

    /// Looks up a kind by its kebab-case name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Looks up a kind by name, falling back to triangles with a warning.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        Self::parse(name).unwrap_or_else(|| {
            tracing::warn!(
                "unsupported primitive '{}' - supported values are 'points', 'lines', \
                 'line-loop', 'line-strip', 'triangles', 'triangle-strip' and \
                 'triangle-fan'; defaulting to 'triangles'",
                name
            );
            Self::Triangles
        })
    }

    /// Kebab-case name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Points => "points",
            Self::Lines => "lines",
            Self::LineLoop => "line-loop",
            Self::LineStrip => "line-strip",
            Self::Triangles => "triangles",
            Self::TriangleStrip => "triangle-strip",
            Self::TriangleFan => "triangle-fan",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for kind in PrimitiveKind::ALL {
            assert_eq!(PrimitiveKind::parse(kind.name()), Some(kind));
        }
    }

    #[test]
    fn test_unknown_falls_back_to_triangles() {
        assert_eq!(PrimitiveKind::from_name("quads"), PrimitiveKind::Triangles);
        assert_eq!(PrimitiveKind::from_name("line-strip"), PrimitiveKind::LineStrip);
    }
}
