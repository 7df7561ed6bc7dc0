use std::fmt::Write;

use crate::{env::TransitionModel, value::QTable};

use super::{Action, Maze, Position};

const CELL: usize = 17;

fn mark(maze: &Maze, pos: Position) -> char {
    if pos == maze.position {
        'o'
    } else if pos == Maze::ORIGIN {
        'S'
    } else if pos == maze.goal() {
        'G'
    } else {
        ' '
    }
}

fn edge_row(maze: &Maze, y: usize, width: usize) -> String {
    let walls = maze.walls();
    let mut line = String::new();
    for x in 0..walls.width() {
        line.push('+');
        let fill = if walls.horizontal(x, y) { '-' } else { ' ' };
        line.extend(std::iter::repeat(fill).take(width));
    }
    line.push('+');
    line
}

fn side(maze: &Maze, x: usize, y: usize) -> char {
    if maze.walls().vertical(x, y) {
        '|'
    } else {
        ' '
    }
}

/// Text rendering of the maze, with four values per cell when a Q table is given
pub(super) fn render(maze: &Maze, q_table: Option<&QTable>) -> String {
    let (w, h) = maze.size();
    let width = if q_table.is_some() { CELL } else { 1 };
    let mut out = format!("count:{}\n", maze.count);

    for y in 0..h {
        out.push_str(&edge_row(maze, y, width));
        out.push('\n');

        match q_table {
            None => {
                for x in 0..w {
                    out.push(side(maze, x, y));
                    out.push(mark(maze, Position::new(x, y)));
                }
                out.push(side(maze, w, y));
                out.push('\n');
            }
            Some(q) => {
                let value = |x, a| q.get(Position::new(x, y), a);
                for x in 0..w {
                    let up = format!("{:.2}", value(x, Action::Up));
                    let _ = write!(out, "{}{:^width$}", side(maze, x, y), up, width = CELL);
                }
                let _ = writeln!(out, "{}", side(maze, w, y));

                for x in 0..w {
                    let _ = write!(
                        out,
                        "{}{:>7.2} {} {:<7.2}",
                        side(maze, x, y),
                        value(x, Action::Left),
                        mark(maze, Position::new(x, y)),
                        value(x, Action::Right),
                    );
                }
                let _ = writeln!(out, "{}", side(maze, w, y));

                for x in 0..w {
                    let down = format!("{:.2}", value(x, Action::Down));
                    let _ = write!(out, "{}{:^width$}", side(maze, x, y), down, width = CELL);
                }
                let _ = writeln!(out, "{}", side(maze, w, y));
            }
        }
    }
    out.push_str(&edge_row(maze, h, width));
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use crate::env::Environment;

    use super::*;

    #[test]
    fn renders_plain_grid() {
        let mut maze = Maze::open(2, 2).unwrap();
        maze.start();
        let text = maze.render(None);
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "count:0");
        assert_eq!(lines[1], "+-+-+");
        assert_eq!(lines[2], "|o  |");
        assert_eq!(lines[3], "+ + +");
        assert_eq!(lines[4], "|  G|");
        assert_eq!(lines[5], "+-+-+");
    }

    #[test]
    fn renders_value_overlay_without_touching_state() {
        let mut maze = Maze::open(2, 1).unwrap();
        maze.start();
        maze.set_action(Action::Right);
        let mut q = QTable::zeros(2, 1);
        q.set(Position::new(0, 0), Action::Right, 1.5);

        let text = maze.render(Some(&q));
        assert!(text.contains("1.50"));
        assert!(text.contains('S'));
        assert_eq!(maze.count(), 1);
        assert_eq!(text.lines().count(), 1 + 1 + 3 + 1);
    }
}
