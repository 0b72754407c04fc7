//! Boundary-tag heap allocator.
//!
//! `tagalloc`は、単一の拡張可能なメモリ領域(アリーナ)を管理し、
//! その上で割当・解放・リサイズ要求を処理するヒープアロケータ.
//!
//! # 特徴
//!
//! - 各ブロックの両端に、サイズと割当フラグを詰め込んだ32bitの"境界タグ"を配置する
//! - ブロック間の移動はタグのサイズ値のみから計算し、ポインタは一切保持しない(暗黙的フリーリスト)
//! - 空き領域の探索はヒープ先頭からのファーストフィット
//! - 大きすぎる空きブロックは分割し、解放時には前後の空きブロックと結合する
//! - ブロックの識別子はアリーナ先頭からのオフセットなので、アリーナの再配置(e.g., `Vec`の伸長)の影響を受けない
//! - シングルスレッド専用 (複数スレッドから使う場合は、利用者側で排他制御を行うこと)
//!
//! # モジュールの依存関係
//!
//! ```text
//! heap => arena
//!  |
//!  +====> tag
//! ```
//!
//! - [heap]モジュール:
//!   - 主に[Heap]構造体を提供
//!   - `tagalloc`の利用者が直接触るのはこの構造体
//! - [arena]モジュール:
//!   - [Arena]トレイトとその実装である[MemoryArena]および[SliceArena]を提供
//!   - ヒープに対して、単調に拡張可能なバイト列を提供するのが目的
//! - [tag]モジュール:
//!   - 境界タグのエンコード・デコードを担当する
//!
//! # メモリレイアウト
//!
//! ```text
//! offset: 0          8          12         16
//!         +----------+----------+----------+----------------------+-----+----------+
//!         | padding  | 開始番兵 | header   | payload ...          | ... | 終端番兵 |
//!         +----------+----------+----------+----------------------+-----+----------+
//!                                          ^ ヒープベース (先頭ブロックのアドレス)
//! ```
//!
//! 番兵のタグはいずれも「サイズ`0`、割当済み」.
//! 先頭のパディングと二つの番兵分の`HEAP_OVERHEAD`バイトを除いた残りが、全てブロックに分配される.
//!
//! [heap]: ./heap/index.html
//! [Heap]: ./heap/struct.Heap.html
//! [arena]: ./arena/index.html
//! [Arena]: ./arena/trait.Arena.html
//! [MemoryArena]: ./arena/struct.MemoryArena.html
//! [SliceArena]: ./arena/struct.SliceArena.html
//! [tag]: ./tag/index.html
#![warn(missing_docs)]
extern crate byteorder;
extern crate prometrics;
#[macro_use]
extern crate trackable;
#[macro_use]
extern crate slog;
#[cfg(test)]
extern crate proptest;

pub use crate::error::{Error, ErrorKind};

pub mod arena;
pub mod heap;
pub mod metrics;
pub mod tag;

mod error;

/// crate固有の`Result`型.
pub type Result<T> = std::result::Result<T, Error>;
