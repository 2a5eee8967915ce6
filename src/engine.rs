use rand::Rng;
use std::fmt;
use std::sync::OnceLock;

/// A direction to move/merge tiles.
///
/// The declaration order is the order in which the search evaluates moves
/// and in which ties are broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Move {
    Up,
    Down,
    Left,
    Right,
}

impl Move {
    /// All directions in evaluation order.
    pub const ALL: [Move; 4] = [Move::Up, Move::Down, Move::Left, Move::Right];

    /// Index of this direction in [`Move::ALL`].
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<u8> for Move {
    type Error = EngineError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Move::Up),
            1 => Ok(Move::Down),
            2 => Ok(Move::Left),
            3 => Ok(Move::Right),
            other => Err(EngineError::InvalidDirection(other)),
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Move::Up => "up",
            Move::Down => "down",
            Move::Left => "left",
            Move::Right => "right",
        };
        f.write_str(name)
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid direction index {0} (expected 0..=3)")]
    InvalidDirection(u8),
}

const LINE_TABLE_SIZE: usize = 0x1_0000; // 65,536 possible 16-bit rows

const ROW_MASK: BoardRaw = 0xFFFF;
const COL_MASK: BoardRaw = 0x000F_000F_000F_000F;

/// Move deltas (`row ^ result`) and game-score contribution for every row.
struct Stores {
    row_left: Box<[Row]>,
    row_right: Box<[Row]>,
    score: Box<[Score]>,
}

type BoardRaw = u64;
pub type Row = u16;
pub type Rank = u8;
pub type Score = u64;

/// Packed 4x4 2048 board as 16 4-bit nibbles in a `u64`.
///
/// Cell `i` (row-major, 0 = top-left) lives in bits `4i..4i+4`, so row `r`
/// is the 16-bit word at bit offset `16r`. A nibble `k` means tile `2^k`;
/// 0 is an empty cell.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Board(BoardRaw);

impl Board {
    /// A constant empty board (all zeros).
    pub const EMPTY: Board = Board(0);

    /// Construct a `Board` from its raw packed representation.
    #[inline]
    pub fn from_raw(raw: BoardRaw) -> Self { Board(raw) }

    /// Consume this `Board`, returning the raw packed `u64`.
    #[inline]
    pub fn into_raw(self) -> BoardRaw { self.0 }

    /// Borrow the raw packed `u64` for this `Board`.
    #[inline]
    pub fn raw(&self) -> BoardRaw { self.0 }

    /// Return the board resulting from sliding/merging tiles in `dir` (no random insert).
    ///
    /// An unchanged board means the move is illegal.
    ///
    /// ```
    /// use expectimax_2048::engine::{Board, Move};
    /// let b = Board::from_raw(0x0011);
    /// assert_eq!(b.shift(Move::Left), Board::from_raw(0x0002));
    /// assert_eq!(b.shift(Move::Left).shift(Move::Left), Board::from_raw(0x0002));
    /// ```
    #[inline]
    pub fn shift(self, dir: Move) -> Self { execute_move(self, dir) }

    /// Place a tile of `rank` at a uniformly chosen empty cell.
    ///
    /// A full board is returned unchanged.
    pub fn with_tile<R: Rng + ?Sized>(self, rank: Rank, rng: &mut R) -> Self {
        let empty = count_empty(self);
        if empty == 0 {
            return self;
        }
        let mut index = rng.gen_range(0..empty);
        let mut tmp = self.0;
        let mut tile = rank as BoardRaw;
        loop {
            while (tmp & 0xf) != 0 {
                tmp >>= 4;
                tile <<= 4;
            }
            if index == 0 { break; }
            index -= 1;
            tmp >>= 4;
            tile <<= 4;
        }
        Board(self.0 | tile)
    }

    /// Insert a random 2 (90%) or 4 (10%) tile into a random empty slot, using the provided RNG.
    ///
    /// ```
    /// use expectimax_2048::engine::Board;
    /// use rand::{SeedableRng, rngs::StdRng};
    /// let mut rng = StdRng::seed_from_u64(123);
    /// let b = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
    /// assert_eq!(b.count_empty(), 14);
    /// ```
    #[inline]
    pub fn with_random_tile<R: Rng + ?Sized>(self, rng: &mut R) -> Self {
        let rank = draw_tile(rng);
        self.with_tile(rank, rng)
    }

    /// Opening position: one tile anywhere on the grid, then a second in a free cell.
    pub fn initial<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let rank = draw_tile(rng) as BoardRaw;
        let first = Board(rank << (rng.gen_range(0..16u32) << 2));
        first.with_random_tile(rng)
    }

    /// Perform a move then insert a random tile if the move changed the board.
    #[inline]
    pub fn make_move<R: Rng + ?Sized>(self, direction: Move, rng: &mut R) -> Self {
        let moved = self.shift(direction);
        if moved != self { moved.with_random_tile(rng) } else { self }
    }

    /// Classic 2048 score implied by the tiles on this board.
    #[inline]
    pub fn score(self) -> Score { score_board(self) }

    /// Return true if no legal moves remain.
    #[inline]
    pub fn is_game_over(self) -> bool { is_game_over(self) }

    /// Count the number of empty cells on the board.
    #[inline]
    pub fn count_empty(self) -> u32 { count_empty(self) }

    /// Rank stored at cell `idx` (0..16, row-major).
    #[inline]
    pub fn rank_at(self, idx: usize) -> Rank {
        debug_assert!(idx < 16);
        ((self.0 >> (4 * idx)) & 0xf) as Rank
    }

    /// Tile value at cell `idx`, 0 when empty.
    #[inline]
    pub fn tile_value(self, idx: usize) -> u32 {
        match self.rank_at(idx) {
            0 => 0,
            rank => 1 << rank,
        }
    }

    /// Highest rank present (0 for an empty board).
    pub fn highest_rank(self) -> Rank {
        (0..16).map(|idx| self.rank_at(idx)).max().unwrap_or(0)
    }

    /// Highest tile value present (e.g. 2048), 0 for an empty board.
    #[inline]
    pub fn highest_tile(self) -> u32 {
        match self.highest_rank() {
            0 => 0,
            rank => 1 << rank,
        }
    }

    /// The 16-bit row `idx` (0 = top).
    #[inline]
    pub fn row(self, idx: usize) -> Row {
        ((self.0 >> (16 * idx)) & ROW_MASK) as Row
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({:#018x})", self.0)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "-----------------------------")?;
        for row in 0..4 {
            for col in 0..4 {
                match self.tile_value(4 * row + col) {
                    0 => write!(f, "|{:>6}", "")?,
                    value => write!(f, "|{:>6}", value)?,
                }
            }
            writeln!(f, "|")?;
        }
        write!(f, "-----------------------------")
    }
}

impl From<BoardRaw> for Board { fn from(v: BoardRaw) -> Self { Board::from_raw(v) } }
impl From<Board> for BoardRaw { fn from(b: Board) -> Self { b.into_raw() } }

/// Build the move/score tables now. Safe to call multiple times; lookups
/// build them lazily otherwise.
pub fn new() {
    let _ = stores();
}

/// Classic 2048 score: every merged tile credited with its value.
pub fn score_board(board: Board) -> Score {
    let score_table = &stores().score;
    (0..4).fold(0, |acc, idx| acc + get_score_entry(score_table, board.row(idx)))
}

/// Slide/merge tiles in the given direction. No randomness.
///
/// Returns `board` unchanged when the move is illegal.
pub fn execute_move(board: Board, direction: Move) -> Board {
    let s = stores();
    match direction {
        Move::Left => shift_rows(board, &s.row_left),
        Move::Right => shift_rows(board, &s.row_right),
        Move::Up => shift_cols(board, &s.row_left),
        Move::Down => shift_cols(board, &s.row_right),
    }
}

/// Like [`execute_move`] for callers holding a raw direction index.
///
/// ```
/// use expectimax_2048::engine::{execute_move_index, Board, EngineError};
/// assert_eq!(execute_move_index(Board::EMPTY, 7), Err(EngineError::InvalidDirection(7)));
/// ```
pub fn execute_move_index(board: Board, direction: u8) -> Result<Board, EngineError> {
    let dir = Move::try_from(direction)?;
    Ok(execute_move(board, dir))
}

/// True if no move in any direction changes the board.
pub fn is_game_over(board: Board) -> bool {
    Move::ALL.iter().all(|&dir| execute_move(board, dir) == board)
}

// Credit to Nneonneo
/// Swap rows and columns.
pub fn transpose(x: BoardRaw) -> BoardRaw {
    let a1 = x & 0xF0F00F0FF0F00F0F;
    let a2 = x & 0x0000F0F00000F0F0;
    let a3 = x & 0x0F0F00000F0F0000;
    let a = a1 | (a2 << 12) | (a3 >> 12);
    let b1 = a & 0xFF00FF0000FF00FF;
    let b2 = a & 0x00FF00FF00000000;
    let b3 = a & 0x00000000FF00FF00;
    b1 | (b2 >> 24) | (b3 << 24)
}

/// Count the number of zero nibbles.
pub fn count_empty(board: Board) -> u32 {
    let mut x = board.0;
    x |= x >> 1;
    x |= x >> 2;
    (!x & 0x1111_1111_1111_1111).count_ones()
}

/// Spread a row's nibbles into one column (stride 16 bits).
#[inline]
pub fn unpack_col(row: Row) -> BoardRaw {
    let tmp = row as BoardRaw;
    (tmp | (tmp << 12) | (tmp << 24) | (tmp << 36)) & COL_MASK
}

/// Reverse nibble order within a row.
#[inline]
pub fn reverse_row(row: Row) -> Row {
    (row >> 12) | ((row >> 4) & 0x00F0) | ((row << 4) & 0x0F00) | (row << 12)
}

/// Decode a row into its four ranks, leftmost cell first.
#[inline]
pub(crate) fn row_to_ranks(row: Row) -> [Rank; 4] {
    [
        (row & 0xf) as Rank,
        ((row >> 4) & 0xf) as Rank,
        ((row >> 8) & 0xf) as Rank,
        ((row >> 12) & 0xf) as Rank,
    ]
}

#[inline]
fn ranks_to_row(ranks: [Rank; 4]) -> Row {
    ranks[0] as Row | (ranks[1] as Row) << 4 | (ranks[2] as Row) << 8 | (ranks[3] as Row) << 12
}

/// Draw the rank of a freshly spawned tile: 1 ("2") nine times in ten, else 2 ("4").
pub fn draw_tile<R: Rng + ?Sized>(rng: &mut R) -> Rank {
    if rng.gen_range(0..10) < 9 {
        1
    } else {
        2
    }
}

static STORES: OnceLock<Stores> = OnceLock::new();

#[inline(always)]
fn stores() -> &'static Stores {
    STORES.get_or_init(create_stores)
}

fn create_stores() -> Stores {
    // Allocate on the heap to avoid large stack frames
    let mut row_left = vec![0 as Row; LINE_TABLE_SIZE];
    let mut row_right = vec![0 as Row; LINE_TABLE_SIZE];
    let mut score = vec![0 as Score; LINE_TABLE_SIZE];

    for val in 0..LINE_TABLE_SIZE {
        let row = val as Row;
        let ranks = row_to_ranks(row);
        score[val] = calc_score(&ranks);

        let result = ranks_to_row(slide_left(ranks));
        row_left[val] = row ^ result;
        // Right is left seen through a mirror.
        let rev_row = reverse_row(row);
        row_right[rev_row as usize] = rev_row ^ reverse_row(result);
    }

    Stores {
        row_left: row_left.into_boxed_slice(),
        row_right: row_right.into_boxed_slice(),
        score: score.into_boxed_slice(),
    }
}

#[inline(always)]
fn get_line_entry(table: &[Row], idx: Row) -> Row {
    debug_assert!((idx as usize) < LINE_TABLE_SIZE);
    unsafe { *table.get_unchecked(idx as usize) }
}

#[inline(always)]
fn get_score_entry(table: &[Score], idx: Row) -> Score {
    debug_assert!((idx as usize) < LINE_TABLE_SIZE);
    unsafe { *table.get_unchecked(idx as usize) }
}

fn shift_rows(board: Board, table: &[Row]) -> Board {
    let res = (0..4).fold(board.0, |acc, row_idx| {
        let delta = get_line_entry(table, board.row(row_idx)) as BoardRaw;
        acc ^ (delta << (16 * row_idx))
    });
    Board(res)
}

fn shift_cols(board: Board, table: &[Row]) -> Board {
    let transposed = Board(transpose(board.0));
    let res = (0..4).fold(board.0, |acc, col_idx| {
        let delta = get_line_entry(table, transposed.row(col_idx));
        acc ^ (unpack_col(delta) << (4 * col_idx))
    });
    Board(res)
}

/// Compact a row toward cell 0, merging equal neighbours once per pass.
fn slide_left(mut line: [Rank; 4]) -> [Rank; 4] {
    let mut i = 0;
    while i < 3 {
        let Some(j) = (i + 1..4).find(|&j| line[j] != 0) else { break };
        if line[i] == 0 {
            line[i] = line[j];
            line[j] = 0;
            continue;
        }
        if line[i] == line[j] {
            if line[i] != 0xf {
                line[i] += 1;
            }
            line[j] = 0;
        }
        i += 1;
    }
    line
}

// Credit to Nneonneo
fn calc_score(ranks: &[Rank; 4]) -> Score {
    let mut score = 0;
    for &rank in ranks {
        if rank >= 2 {
            // the score is the total sum of the tile and all intermediate merged tiles
            let rank = rank as Score;
            score += (rank - 1) * (1 << rank);
        }
    }
    score
}
