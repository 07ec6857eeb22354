use std::fmt;

/// Top-level game flow. Only `Gameplay` runs the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GameState {
    #[default]
    MainMenu,
    Gameplay,
    GameOver,
    Win,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    Start,
    PlayerDefeated,
    StageCleared,
    ReturnToMenu,
}

impl GameState {
    /// Next state after `event`. Events that make no sense in the current
    /// state are ignored.
    pub fn transition(self, event: GameEvent) -> GameState {
        match (self, event) {
            (GameState::MainMenu, GameEvent::Start) => GameState::Gameplay,
            (GameState::Gameplay, GameEvent::PlayerDefeated) => GameState::GameOver,
            (GameState::Gameplay, GameEvent::StageCleared) => GameState::Win,
            (GameState::GameOver | GameState::Win, GameEvent::ReturnToMenu) => GameState::MainMenu,
            (state, _) => state,
        }
    }

    pub fn is_running(self) -> bool {
        self == GameState::Gameplay
    }

    pub fn label(self) -> &'static str {
        match self {
            GameState::MainMenu => "Main Menu",
            GameState::Gameplay => "Gameplay",
            GameState::GameOver => "Game Over",
            GameState::Win => "Win",
        }
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
