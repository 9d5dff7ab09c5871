// World geometry and match rules. Distances are in canvas pixels, speeds in
// pixels per tick.

/// Canvas width (pixels)
pub const CANVAS_WIDTH: f64 = 1152.0;

/// Canvas height (pixels)
pub const CANVAS_HEIGHT: f64 = 864.0;

/// Paddle width, 1.8% of canvas width
pub const PADDLE_WIDTH: f64 = CANVAS_WIDTH * 0.018;

/// Paddle height, 15% of canvas height
pub const PADDLE_HEIGHT: f64 = CANVAS_HEIGHT * 0.15;

/// Paddle distance from its edge, 3% of canvas width
pub const PADDLE_OFFSET: f64 = CANVAS_WIDTH * 0.03;

/// Paddle vertical speed, 1% of canvas height
pub const PADDLE_SPEED: f64 = CANVAS_HEIGHT * 0.01;

/// Ball radius (pixels)
pub const BALL_RADIUS: f64 = 10.0;

/// Serve speed, 1% of canvas height
pub const BALL_BASE_SPEED: f64 = CANVAS_HEIGHT * 0.01;

/// Speed added on every paddle hit, 2.3% of base speed
pub const SPEED_INCREMENT: f64 = BALL_BASE_SPEED * 0.023;

/// Extra speed for a hit at the very tip of the paddle
pub const EDGE_BONUS: f64 = 1.0;

/// Maximum bounce angle off paddle (degrees)
pub const MAX_BOUNCE_ANGLE_DEG: f64 = 45.0;

/// Vertical serve jitter bound, 23% of base speed
pub const SERVE_JITTER: f64 = BALL_BASE_SPEED * 0.23;

/// Points needed to win a match
pub const MAX_SCORE: u32 = 7;

/// Countdown before physics starts or resumes (ms)
pub const GAME_START_TIMER_MS: i64 = 3_000;

/// Cumulative absence after which a player forfeits (ms)
pub const MAX_DISCONNECT_ACCUMULATED_MS: i64 = 180_000;

/// Scheduler period (ms)
pub const TICK_INTERVAL_MS: u64 = 16;

/// Resting paddle position: vertically centered.
pub const PADDLE_REST_Y: f64 = CANVAS_HEIGHT / 2.0 - PADDLE_HEIGHT / 2.0;

/// Left edge of the left paddle.
pub const LEFT_PADDLE_X: f64 = PADDLE_OFFSET;

/// Left edge of the right paddle.
pub const RIGHT_PADDLE_X: f64 = CANVAS_WIDTH - PADDLE_OFFSET - PADDLE_WIDTH;
