//! Spatial position, propagated from parents to children.

use crate::component::{Component, ComponentID, RelativeComponent};

/// A 2D position relative to the entity's parent.
///
/// When the entity has a parent holding a position, `global()` includes the
/// parent's global position.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    x: f32,
    y: f32,
    parent: Option<(f32, f32)>,
}

impl Position {
    /// Create a new position with no parent offset.
    pub fn new(x: f32, y: f32) -> Position {
        Position {
            x,
            y,
            parent: None,
        }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    /// Return the position relative to the parent.
    pub fn local(&self) -> (f32, f32) {
        (self.x, self.y)
    }

    /// Return the position including the parent's offset.
    pub fn global(&self) -> (f32, f32) {
        let (px, py) = self.parent.unwrap_or((0.0, 0.0));
        (self.x + px, self.y + py)
    }

    /// Return a copy of this position moved by the given offset.
    pub fn translated(&self, dx: f32, dy: f32) -> Position {
        Position {
            x: self.x + dx,
            y: self.y + dy,
            parent: self.parent,
        }
    }
}

impl Component for Position {
    fn umbrella() -> Option<ComponentID> {
        Some(ComponentID::TRANSFORM)
    }

    fn is_relative() -> bool {
        true
    }

    fn dyn_eq(&self, other: &dyn Component) -> bool {
        other.downcast_ref::<Position>().map_or(false, |o| o == self)
    }

    fn as_relative(&self) -> Option<&dyn RelativeComponent> {
        Some(self)
    }
}

impl RelativeComponent for Position {
    fn has_parent(&self) -> bool {
        self.parent.is_some()
    }

    fn with_parent(&self, parent: &dyn Component) -> Box<dyn Component> {
        let parent = parent.downcast_ref::<Position>().map(Position::global);
        Box::new(Position {
            parent,
            ..*self
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_global_includes_parent() {
        let parent = Position::new(10.0, 5.0);
        let child = Position::new(1.0, 2.0);

        let combined = child.with_parent(&parent);
        let combined = combined.downcast_ref::<Position>().unwrap();
        assert!(combined.has_parent());
        assert_eq!(combined.local(), (1.0, 2.0));
        assert_eq!(combined.global(), (11.0, 7.0));
    }

    #[test]
    fn test_nested_parents_accumulate() {
        let root = Position::new(1.0, 1.0);
        let middle = Position::new(2.0, 0.0).with_parent(&root);
        let leaf = Position::new(0.0, 3.0).with_parent(&*middle);

        assert_eq!(leaf.downcast_ref::<Position>().unwrap().global(), (3.0, 4.0));
    }
}
