//! Per-tick ball and paddle physics.

use rand::Rng;

use super::constants::*;
use super::{Ball, PaddleInput, Side};

/// Apply one tick of input to a paddle, keeping it on the canvas.
pub fn move_paddle(y: f64, input: PaddleInput) -> f64 {
    let mut y = y;
    if input.up {
        y -= PADDLE_SPEED;
    }
    if input.down {
        y += PADDLE_SPEED;
    }
    y.clamp(0.0, CANVAS_HEIGHT - PADDLE_HEIGHT)
}

/// Advance the ball one tick against both paddles.
///
/// Returns the side that scored when the ball crossed a goal line.
pub fn step_ball(ball: &mut Ball, left_y: f64, right_y: f64) -> Option<Side> {
    let prev_x = ball.position.x;
    let prev_y = ball.position.y;

    ball.position.x += ball.velocity.vx;
    ball.position.y += ball.velocity.vy;

    bounce_off_walls(ball);

    if ball.velocity.vx < 0.0 && hits_paddle(ball, prev_x, prev_y, Side::Left, left_y) {
        bounce_off_paddle(ball, Side::Left, left_y);
    } else if ball.velocity.vx > 0.0 && hits_paddle(ball, prev_x, prev_y, Side::Right, right_y) {
        bounce_off_paddle(ball, Side::Right, right_y);
    }

    if ball.position.x < 0.0 {
        Some(Side::Right)
    } else if ball.position.x > CANVAS_WIDTH {
        Some(Side::Left)
    } else {
        None
    }
}

fn bounce_off_walls(ball: &mut Ball) {
    if ball.position.y - BALL_RADIUS < 0.0 {
        ball.position.y = BALL_RADIUS;
        ball.velocity.vy = ball.velocity.vy.abs();
    } else if ball.position.y + BALL_RADIUS > CANVAS_HEIGHT {
        ball.position.y = CANVAS_HEIGHT - BALL_RADIUS;
        ball.velocity.vy = -ball.velocity.vy.abs();
    }
}

fn paddle_x(side: Side) -> f64 {
    match side {
        Side::Left => LEFT_PADDLE_X,
        Side::Right => RIGHT_PADDLE_X,
    }
}

fn hits_paddle(ball: &Ball, prev_x: f64, prev_y: f64, side: Side, paddle_y: f64) -> bool {
    overlaps_paddle(ball, side, paddle_y) || crosses_front_face(ball, prev_x, prev_y, side, paddle_y)
}

/// Circle/rectangle overlap. A ball whose center is already behind the
/// paddle does not count.
fn overlaps_paddle(ball: &Ball, side: Side, paddle_y: f64) -> bool {
    let px = paddle_x(side);
    let in_front = match side {
        Side::Left => ball.position.x >= px,
        Side::Right => ball.position.x <= px + PADDLE_WIDTH,
    };
    if !in_front {
        return false;
    }

    let cx = ball.position.x.clamp(px, px + PADDLE_WIDTH);
    let cy = ball.position.y.clamp(paddle_y, paddle_y + PADDLE_HEIGHT);
    let dx = ball.position.x - cx;
    let dy = ball.position.y - cy;
    dx * dx + dy * dy <= BALL_RADIUS * BALL_RADIUS
}

/// Swept test: did the ball's leading edge pass the paddle's front face
/// during this tick, at a height the paddle covers?
fn crosses_front_face(ball: &Ball, prev_x: f64, prev_y: f64, side: Side, paddle_y: f64) -> bool {
    let (face, before, after) = match side {
        Side::Left => (
            LEFT_PADDLE_X + PADDLE_WIDTH,
            prev_x - BALL_RADIUS,
            ball.position.x - BALL_RADIUS,
        ),
        Side::Right => (
            RIGHT_PADDLE_X,
            prev_x + BALL_RADIUS,
            ball.position.x + BALL_RADIUS,
        ),
    };

    let crossed = match side {
        Side::Left => before >= face && after < face,
        Side::Right => before <= face && after > face,
    };
    if !crossed {
        return false;
    }

    let t = (face - before) / (after - before);
    let y = prev_y + (ball.position.y - prev_y) * t;
    y + BALL_RADIUS >= paddle_y && y - BALL_RADIUS <= paddle_y + PADDLE_HEIGHT
}

/// Reflect the ball off a paddle.
///
/// The hit offset from the paddle center sets the outgoing angle (up to 45°)
/// and adds speed; the ball is placed flush against the paddle face.
pub fn bounce_off_paddle(ball: &mut Ball, side: Side, paddle_y: f64) {
    let half = PADDLE_HEIGHT / 2.0;
    let center = paddle_y + half;
    let h = ((ball.position.y - center) / half).clamp(-1.0, 1.0);

    let speed = ball.speed() + SPEED_INCREMENT + h.abs() * EDGE_BONUS;
    let angle = (h * MAX_BOUNCE_ANGLE_DEG).to_radians();
    let dir = match side {
        Side::Left => 1.0,
        Side::Right => -1.0,
    };

    ball.velocity.vx = dir * speed * angle.cos();
    ball.velocity.vy = speed * angle.sin();
    ball.position.x = match side {
        Side::Left => LEFT_PADDLE_X + PADDLE_WIDTH + BALL_RADIUS,
        Side::Right => RIGHT_PADDLE_X - BALL_RADIUS,
    };
}

/// Put the ball at rest in the middle of the canvas.
pub fn center_ball(ball: &mut Ball) {
    ball.position.x = CANVAS_WIDTH / 2.0;
    ball.position.y = CANVAS_HEIGHT / 2.0;
    ball.velocity.vx = 0.0;
    ball.velocity.vy = 0.0;
}

/// Launch the ball at base speed toward `toward`, with vertical jitter.
pub fn serve<R: Rng + ?Sized>(ball: &mut Ball, toward: Side, rng: &mut R) {
    let dir = match toward {
        Side::Left => -1.0,
        Side::Right => 1.0,
    };
    ball.velocity.vx = dir * BALL_BASE_SPEED;
    ball.velocity.vy = rng.gen_range(-SERVE_JITTER..=SERVE_JITTER);
}
