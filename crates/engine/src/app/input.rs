#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    ToggleMode,
    Quit,
}

const ACTION_COUNT: usize = 6;

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ActionStates {
    down: [bool; ACTION_COUNT],
}

impl ActionStates {
    pub(crate) fn set(&mut self, action: InputAction, is_down: bool) {
        self.down[action.index()] = is_down;
    }

    pub(crate) fn is_down(&self, action: InputAction) -> bool {
        self.down[action.index()]
    }
}

impl InputAction {
    const fn index(self) -> usize {
        match self {
            InputAction::MoveUp => 0,
            InputAction::MoveDown => 1,
            InputAction::MoveLeft => 2,
            InputAction::MoveRight => 3,
            InputAction::ToggleMode => 4,
            InputAction::Quit => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InputSnapshot {
    actions: ActionStates,
    toggle_mode_pressed: bool,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.actions.is_down(action)
    }

    pub fn quit_requested(&self) -> bool {
        self.actions.is_down(InputAction::Quit)
    }

    /// Edge-triggered; true only on the tick the toggle was pressed.
    pub fn toggle_mode_pressed(&self) -> bool {
        self.toggle_mode_pressed
    }

    pub fn with_action_down(mut self, action: InputAction, is_down: bool) -> Self {
        self.actions.set(action, is_down);
        self
    }

    pub fn with_toggle_mode_pressed(mut self, pressed: bool) -> Self {
        self.toggle_mode_pressed = pressed;
        self
    }

    /// Unit-or-zero movement direction from the four move actions.
    pub fn move_axis(&self) -> (f32, f32) {
        let mut x = 0.0f32;
        let mut y = 0.0f32;
        if self.is_down(InputAction::MoveRight) {
            x += 1.0;
        }
        if self.is_down(InputAction::MoveLeft) {
            x -= 1.0;
        }
        if self.is_down(InputAction::MoveUp) {
            y += 1.0;
        }
        if self.is_down(InputAction::MoveDown) {
            y -= 1.0;
        }

        let len_sq = x * x + y * y;
        if len_sq > 0.0 {
            let inv_len = len_sq.sqrt().recip();
            x *= inv_len;
            y *= inv_len;
        }
        (x, y)
    }
}

/// Supplies one input snapshot per simulation tick.
pub trait InputSource {
    fn next_snapshot(&mut self, tick_index: u64) -> InputSnapshot;
}

/// Input source that never presses anything.
#[derive(Debug, Default)]
pub struct IdleInput;

impl InputSource for IdleInput {
    fn next_snapshot(&mut self, _tick_index: u64) -> InputSnapshot {
        InputSnapshot::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagonal_move_axis_is_normalized() {
        let snapshot = InputSnapshot::empty()
            .with_action_down(InputAction::MoveRight, true)
            .with_action_down(InputAction::MoveUp, true);
        let (x, y) = snapshot.move_axis();
        assert!(((x * x + y * y) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn opposing_actions_cancel() {
        let snapshot = InputSnapshot::empty()
            .with_action_down(InputAction::MoveLeft, true)
            .with_action_down(InputAction::MoveRight, true);
        assert_eq!(snapshot.move_axis(), (0.0, 0.0));
    }
}
