//! [Prometheus][prometheus]用のメトリクス.
//!
//! [prometheus]: https://prometheus.io/
use prometrics::metrics::{Counter, Gauge, MetricBuilder};

/// ヒープのメトリクス.
#[derive(Debug, Clone)]
pub struct HeapMetrics {
    pub(crate) allocations: Counter,
    pub(crate) allocated_bytes: Counter,
    pub(crate) releases: Counter,
    pub(crate) released_bytes: Counter,
    pub(crate) reallocations_in_place: Counter,
    pub(crate) reallocations_moved: Counter,
    pub(crate) splits: Counter,
    pub(crate) coalesces: Counter,
    pub(crate) growths: Counter,
    pub(crate) granted_bytes: Gauge,
    pub(crate) zero_size_requests: Counter,
    pub(crate) exhausted_failures: Counter,
    pub(crate) invalid_frees: Counter,
}
impl HeapMetrics {
    /// ブロックの割当回数.
    ///
    /// `realloc`内部で新規ブロックへの移動が発生した場合の割当も含まれる.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// tagalloc_heap_allocations_total <COUNTER>
    /// ```
    pub fn allocations(&self) -> u64 {
        self.allocations.value() as u64
    }

    /// これまでに割り当てたブロックのバイト数(ヘッダおよびフッタ込み).
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// tagalloc_heap_allocated_bytes_total <COUNTER>
    /// ```
    pub fn allocated_bytes(&self) -> u64 {
        self.allocated_bytes.value() as u64
    }

    /// ブロックの解放回数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// tagalloc_heap_releases_total <COUNTER>
    /// ```
    pub fn releases(&self) -> u64 {
        self.releases.value() as u64
    }

    /// これまでに解放されたブロックのバイト数(ヘッダおよびフッタ込み).
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// tagalloc_heap_released_bytes_total <COUNTER>
    /// ```
    pub fn released_bytes(&self) -> u64 {
        self.released_bytes.value() as u64
    }

    /// リサイズ回数.
    ///
    /// 返り値のタプルの第一要素は`mode="in_place"`ラベルを持ち、第二要素は`mode="moved"`ラベルを持つ.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// tagalloc_heap_reallocations_total { mode="in_place|moved" } <COUNTER>
    /// ```
    pub fn reallocations(&self) -> (u64, u64) {
        (
            self.reallocations_in_place.value() as u64,
            self.reallocations_moved.value() as u64,
        )
    }

    /// 空きブロックの分割回数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// tagalloc_heap_splits_total <COUNTER>
    /// ```
    pub fn splits(&self) -> u64 {
        self.splits.value() as u64
    }

    /// 隣接する空きブロック同士の結合回数.
    ///
    /// 三つのブロックが一度に結合された場合は`2`とカウントされる.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// tagalloc_heap_coalesces_total <COUNTER>
    /// ```
    pub fn coalesces(&self) -> u64 {
        self.coalesces.value() as u64
    }

    /// アリーナの拡張回数(初期化時の拡張を含む).
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// tagalloc_heap_growths_total <COUNTER>
    /// ```
    pub fn growths(&self) -> u64 {
        self.growths.value() as u64
    }

    /// アリーナから払い出されたバイト数の合計.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// tagalloc_heap_granted_bytes <GAUGE>
    /// ```
    pub fn granted_bytes(&self) -> u64 {
        self.granted_bytes.value() as u64
    }

    /// サイズ`0`の割当要求の回数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// tagalloc_heap_zero_size_requests_total <COUNTER>
    /// ```
    pub fn zero_size_requests(&self) -> u64 {
        self.zero_size_requests.value() as u64
    }

    /// アリーナを拡張できなかったことによる割当失敗回数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// tagalloc_heap_exhausted_failures_total <COUNTER>
    /// ```
    pub fn exhausted_failures(&self) -> u64 {
        self.exhausted_failures.value() as u64
    }

    /// 拒否された解放要求の回数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// tagalloc_heap_invalid_frees_total <COUNTER>
    /// ```
    pub fn invalid_frees(&self) -> u64 {
        self.invalid_frees.value() as u64
    }

    /// 割当中のバイト数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// tagalloc_heap_allocated_bytes_total - tagalloc_heap_released_bytes_total
    /// ```
    pub fn usage_bytes(&self) -> u64 {
        // NOTE: 以下の順番で値を取得しないとアンダーフローする可能性がある
        let dec = self.released_bytes();
        let inc = self.allocated_bytes();
        inc - dec
    }

    pub(crate) fn new(builder: &MetricBuilder) -> Self {
        let mut builder = builder.clone();
        builder.namespace("tagalloc").subsystem("heap");
        HeapMetrics {
            allocations: builder
                .counter("allocations_total")
                .help("Number of allocated blocks")
                .finish()
                .expect("Never fails"),
            allocated_bytes: builder
                .counter("allocated_bytes_total")
                .help("Number of allocated bytes")
                .finish()
                .expect("Never fails"),
            releases: builder
                .counter("releases_total")
                .help("Number of released blocks")
                .finish()
                .expect("Never fails"),
            released_bytes: builder
                .counter("released_bytes_total")
                .help("Number of released bytes")
                .finish()
                .expect("Never fails"),
            reallocations_in_place: builder
                .counter("reallocations_total")
                .help("Number of reallocations")
                .label("mode", "in_place")
                .finish()
                .expect("Never fails"),
            reallocations_moved: builder
                .counter("reallocations_total")
                .help("Number of reallocations")
                .label("mode", "moved")
                .finish()
                .expect("Never fails"),
            splits: builder
                .counter("splits_total")
                .help("Number of free block splits")
                .finish()
                .expect("Never fails"),
            coalesces: builder
                .counter("coalesces_total")
                .help("Number of merges of adjacent free blocks")
                .finish()
                .expect("Never fails"),
            growths: builder
                .counter("growths_total")
                .help("Number of arena extensions")
                .finish()
                .expect("Never fails"),
            granted_bytes: builder
                .gauge("granted_bytes")
                .help("Number of bytes granted by the arena")
                .finish()
                .expect("Never fails"),
            zero_size_requests: builder
                .counter("zero_size_requests_total")
                .help("Number of allocation requests with zero size")
                .finish()
                .expect("Never fails"),
            exhausted_failures: builder
                .counter("exhausted_failures_total")
                .help("Number of allocation failures caused by arena exhaustion")
                .finish()
                .expect("Never fails"),
            invalid_frees: builder
                .counter("invalid_frees_total")
                .help("Number of rejected free requests")
                .finish()
                .expect("Never fails"),
        }
    }

    pub(crate) fn count_allocation(&self, size_bytes: u64) {
        self.allocations.increment();
        self.allocated_bytes.add_u64(size_bytes);
    }

    pub(crate) fn count_release(&self, size_bytes: u64) {
        self.releases.increment();
        self.released_bytes.add_u64(size_bytes);
    }
}
