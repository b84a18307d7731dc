//! # Measure Engine — Stable Ids, One Dispatch
//!
//! Every diversity measure the engine knows, keyed by a stable numeric id.
//! [`evaluate`] is the single entry point: it refreshes stale proportions,
//! triggers lazy spanning-tree construction for the measures that need it,
//! and converts non-finite results into hard errors instead of letting NaN
//! leak into reports.
//!
//! | ids     | family               | requires                     |
//! |---------|----------------------|------------------------------|
//! | 0..=4   | entropy              | proportions                  |
//! | 5..=25  | evenness / dominance | proportions (13: raw counts) |
//! | 26..=31 | disparity            | distance matrix              |
//! | 32..=33 | tree reductions      | matrix + completed MST       |
//! | 34..=35 | centroid reductions  | matrix + bound vector store  |

use std::sync::Arc;

use parking_lot::MappedMutexGuard;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::MeasureParams;
use crate::graph::Graph;
use crate::matrix::DistanceMatrix;
use crate::model::VectorData;
use crate::store::EmbeddingProvider;
use crate::{Error, Result};

mod disparity;
mod entropy;
mod evenness;
mod mst_measures;

// ============================================================================
// MeasureId
// ============================================================================

/// Stable numeric identity of every measure the engine evaluates.
///
/// Ids appear in reports and cross API boundaries, so the discriminants are
/// explicit and never reassigned; retired measures would leave holes rather
/// than shift their successors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum MeasureId {
    // ---- entropy -----------------------------------------------------
    /// Shannon-Weaver entropy, Hill number `e^H`.
    ShannonWeaver = 0,
    /// q-logarithmic (Tsallis) entropy of order `alpha`.
    QLogarithmic = 1,
    /// Patil-Taillie diversity of order `alpha`.
    PatilTaillie = 2,
    /// Rényi entropy of order `alpha`.
    Renyi = 3,
    /// Good's generalised entropy with exponents `alpha`, `beta`.
    Good = 4,
    // ---- evenness / dominance ----------------------------------------
    /// Simpson's dominance `D = Σ p²`.
    SimpsonDominance = 5,
    /// Simpson's index `1 − D`.
    Simpson = 6,
    /// Node count.
    Richness = 7,
    /// Node count minus one.
    SpeciesCount = 8,
    /// Hill evenness: ratio of the order-`alpha` and order-`beta` Hill numbers.
    HillEvenness = 9,
    /// Shannon evenness `H / ln n`.
    ShannonEvenness = 10,
    /// Berger-Parker dominance: the largest proportion.
    BergerParker = 11,
    /// Junge (1994) evenness.
    Junge1994 = 12,
    /// Brillouin's index over raw occurrence counts.
    Brillouin = 13,
    /// McIntosh evenness.
    McIntosh = 14,
    /// Heip evenness `(e^H − 1) / (n − 1)`.
    HeipEvenness = 15,
    /// Simpson evenness `(1 − D) / (1 − 1/n)`.
    OneMinusD = 16,
    /// Williams (1964): `(1/D) / n`.
    Williams1964 = 17,
    /// Pielou (1977): `−ln D / ln n`.
    Pielou1977 = 18,
    /// Alatalo (1981) `F₂,₁`.
    Alatalo1981 = 19,
    /// Molinari (1989) `G₂,₁`.
    Molinari1989 = 20,
    /// Bulla (1994) overlap `O`.
    BullaO1994 = 21,
    /// Bulla (1994) evenness `E`.
    BullaE1994 = 22,
    /// Pielou (1969) minimum-concentration evenness.
    Pielou1969 = 23,
    /// Camargo (1993) evenness.
    Camargo1993 = 24,
    /// Smith & Wilson (1996) `E_VAR`.
    SmithWilson1996 = 25,
    // ---- disparity ----------------------------------------------------
    /// Mean pairwise distance.
    Pairwise = 26,
    /// Chao et al. (2014) functional diversity of order `alpha`.
    ChaoEtAl = 27,
    /// Leinster-Cobbold (2012) similarity-sensitive diversity of order `alpha`.
    LeinsterCobbold = 28,
    /// Scheiner (2012) species-phylogenetic-functional diversity.
    Scheiner = 29,
    /// Stirling (2007) diversity with exponents `alpha`, `beta`.
    Stirling = 30,
    /// Ricotta-Szeidl (2006) quadratic-entropy generalisation.
    RicottaSzeidl = 31,
    // ---- tree / centroid reductions -----------------------------------
    /// Villéger et al. (2008) functional evenness over MST edge shares.
    FunctionalEvenness = 32,
    /// Edge-share evenness of the MST against a perfectly regular tree.
    AggregateMst = 33,
    /// Laliberté & Legendre (2010) dispersion around the weighted centroid.
    FunctionalDispersion = 34,
    /// Villéger et al. (2008) divergence of centroid distances.
    FunctionalDivergence = 35,
}

impl MeasureId {
    /// Every measure, in id order. Handy for sweeping the whole roster.
    pub const ALL: [MeasureId; 36] = [
        MeasureId::ShannonWeaver,
        MeasureId::QLogarithmic,
        MeasureId::PatilTaillie,
        MeasureId::Renyi,
        MeasureId::Good,
        MeasureId::SimpsonDominance,
        MeasureId::Simpson,
        MeasureId::Richness,
        MeasureId::SpeciesCount,
        MeasureId::HillEvenness,
        MeasureId::ShannonEvenness,
        MeasureId::BergerParker,
        MeasureId::Junge1994,
        MeasureId::Brillouin,
        MeasureId::McIntosh,
        MeasureId::HeipEvenness,
        MeasureId::OneMinusD,
        MeasureId::Williams1964,
        MeasureId::Pielou1977,
        MeasureId::Alatalo1981,
        MeasureId::Molinari1989,
        MeasureId::BullaO1994,
        MeasureId::BullaE1994,
        MeasureId::Pielou1969,
        MeasureId::Camargo1993,
        MeasureId::SmithWilson1996,
        MeasureId::Pairwise,
        MeasureId::ChaoEtAl,
        MeasureId::LeinsterCobbold,
        MeasureId::Scheiner,
        MeasureId::Stirling,
        MeasureId::RicottaSzeidl,
        MeasureId::FunctionalEvenness,
        MeasureId::AggregateMst,
        MeasureId::FunctionalDispersion,
        MeasureId::FunctionalDivergence,
    ];

    /// Resolve a raw id. Unknown ids are an error, never a default.
    pub fn from_id(id: u32) -> Result<Self> {
        Self::ALL
            .get(id as usize)
            .copied()
            .ok_or(Error::UnknownMeasure(id))
    }

    pub fn id(self) -> u32 {
        self as u32
    }

    /// Human-readable name, as it appears in reports and error messages.
    pub fn name(self) -> &'static str {
        match self {
            MeasureId::ShannonWeaver => "Shannon-Weaver",
            MeasureId::QLogarithmic => "q-logarithmic",
            MeasureId::PatilTaillie => "Patil-Taillie",
            MeasureId::Renyi => "Rényi",
            MeasureId::Good => "Good",
            MeasureId::SimpsonDominance => "Simpson dominance",
            MeasureId::Simpson => "Simpson",
            MeasureId::Richness => "richness",
            MeasureId::SpeciesCount => "species count",
            MeasureId::HillEvenness => "Hill evenness",
            MeasureId::ShannonEvenness => "Shannon evenness",
            MeasureId::BergerParker => "Berger-Parker",
            MeasureId::Junge1994 => "Junge 1994",
            MeasureId::Brillouin => "Brillouin",
            MeasureId::McIntosh => "McIntosh",
            MeasureId::HeipEvenness => "Heip evenness",
            MeasureId::OneMinusD => "one minus Simpson dominance",
            MeasureId::Williams1964 => "Williams 1964",
            MeasureId::Pielou1977 => "Pielou 1977",
            MeasureId::Alatalo1981 => "Alatalo 1981",
            MeasureId::Molinari1989 => "Molinari 1989",
            MeasureId::BullaO1994 => "Bulla O 1994",
            MeasureId::BullaE1994 => "Bulla E 1994",
            MeasureId::Pielou1969 => "Pielou 1969",
            MeasureId::Camargo1993 => "Camargo 1993",
            MeasureId::SmithWilson1996 => "Smith & Wilson 1996",
            MeasureId::Pairwise => "pairwise",
            MeasureId::ChaoEtAl => "Chao et al.",
            MeasureId::LeinsterCobbold => "Leinster-Cobbold",
            MeasureId::Scheiner => "Scheiner",
            MeasureId::Stirling => "Stirling",
            MeasureId::RicottaSzeidl => "Ricotta-Szeidl",
            MeasureId::FunctionalEvenness => "functional evenness",
            MeasureId::AggregateMst => "aggregate MST",
            MeasureId::FunctionalDispersion => "functional dispersion",
            MeasureId::FunctionalDivergence => "functional divergence",
        }
    }

    /// Whether evaluation reads the distance matrix (directly or through
    /// the spanning tree derived from it).
    pub fn requires_matrix(self) -> bool {
        self.id() >= MeasureId::Pairwise.id()
    }

    /// Whether evaluation reduces over the completed spanning tree.
    pub fn requires_mst(self) -> bool {
        matches!(self, MeasureId::FunctionalEvenness | MeasureId::AggregateMst)
    }

    /// Whether evaluation reads raw vectors from the bound store.
    pub fn requires_store(self) -> bool {
        matches!(
            self,
            MeasureId::FunctionalDispersion | MeasureId::FunctionalDivergence
        )
    }
}

impl std::fmt::Display for MeasureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// MeasureOutput
// ============================================================================

/// What one evaluation produces: the measure itself, and the Hill number
/// (effective node count) for the measures that define one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasureOutput {
    pub value: f64,
    pub effective: Option<f64>,
}

// ============================================================================
// Dispatch
// ============================================================================

/// Evaluate one measure against a graph.
///
/// Stale proportions are recomputed here rather than rejected; the two
/// tree reductions trigger [`Graph::ensure_spanning_tree`] first. Any
/// non-finite result is turned into [`Error::NotFinite`] so degenerate
/// inputs (zero totals, singular order parameters) fail loudly.
pub fn evaluate(
    graph: &mut Graph,
    provider: Option<&dyn EmbeddingProvider>,
    id: MeasureId,
    params: MeasureParams,
) -> Result<MeasureOutput> {
    if !graph.proportions_fresh() {
        debug!(measure = id.name(), "recomputing stale proportions");
        graph.compute_relative_proportions()?;
    }
    if id.requires_mst() {
        graph.ensure_spanning_tree()?;
    }

    let p = graph.proportions();
    let MeasureParams { alpha, beta } = params;

    let (value, effective) = match id {
        MeasureId::ShannonWeaver => two(entropy::shannon_weaver(&p)),
        MeasureId::QLogarithmic => two(entropy::q_logarithmic(&p, alpha)),
        MeasureId::PatilTaillie => two(entropy::patil_taillie(&p, alpha)),
        MeasureId::Renyi => two(entropy::renyi(&p, alpha)),
        MeasureId::Good => one(entropy::good(&p, alpha, beta)),
        MeasureId::SimpsonDominance => one(evenness::simpson_dominance(&p)),
        MeasureId::Simpson => one(evenness::simpson(&p)),
        MeasureId::Richness => one(evenness::richness(&p)),
        MeasureId::SpeciesCount => one(evenness::species_count(&p)),
        MeasureId::HillEvenness => one(evenness::hill_evenness(&p, alpha, beta)),
        MeasureId::ShannonEvenness => one(evenness::shannon_evenness(&p)),
        MeasureId::BergerParker => one(evenness::berger_parker(&p)),
        MeasureId::Junge1994 => one(evenness::junge_1994(&p)),
        MeasureId::Brillouin => one(evenness::brillouin(&graph.absolutes())),
        MeasureId::McIntosh => one(evenness::mcintosh(&p)),
        MeasureId::HeipEvenness => one(evenness::heip(&p)),
        MeasureId::OneMinusD => one(evenness::one_minus_d(&p)),
        MeasureId::Williams1964 => one(evenness::williams_1964(&p)),
        MeasureId::Pielou1977 => one(evenness::pielou_1977(&p)),
        MeasureId::Alatalo1981 => one(evenness::alatalo_1981(&p)),
        MeasureId::Molinari1989 => one(evenness::molinari_1989(&p)),
        MeasureId::BullaO1994 => one(evenness::bulla_o_1994(&p)),
        MeasureId::BullaE1994 => one(evenness::bulla_e_1994(&p)),
        MeasureId::Pielou1969 => one(evenness::pielou_1969(&p)),
        MeasureId::Camargo1993 => one(evenness::camargo_1993(&p)),
        MeasureId::SmithWilson1996 => one(evenness::smith_wilson_1996(&p)),
        MeasureId::Pairwise => {
            let m = need_matrix(graph)?;
            one(disparity::pairwise(&m))
        }
        MeasureId::ChaoEtAl => {
            let m = need_matrix(graph)?;
            two(disparity::chao_et_al(&m, &p, alpha))
        }
        MeasureId::LeinsterCobbold => {
            let m = need_matrix(graph)?;
            two(disparity::leinster_cobbold(&m, &p, alpha))
        }
        MeasureId::Scheiner => {
            let counts = graph.absolutes();
            let dims = graph.dims();
            let m = need_matrix(graph)?;
            two(disparity::scheiner(&m, &counts, dims, alpha))
        }
        MeasureId::Stirling => {
            let m = need_matrix(graph)?;
            one(disparity::stirling(&m, &p, alpha, beta))
        }
        MeasureId::RicottaSzeidl => {
            let m = need_matrix(graph)?;
            one(disparity::ricotta_szeidl(&m, &p, alpha))
        }
        MeasureId::FunctionalEvenness => {
            // the tree was completed above; adjacency is its write-back
            one(mst_measures::functional_evenness(&graph.adjacency(), &p))
        }
        MeasureId::AggregateMst => {
            let m = need_matrix(graph)?;
            mst_measures::aggregate_mst(&m)
        }
        MeasureId::FunctionalDispersion => {
            need_matrix(graph)?;
            let vectors = gather_vectors(graph, provider, id)?;
            one(disparity::dispersion(&vectors, &p))
        }
        MeasureId::FunctionalDivergence => {
            need_matrix(graph)?;
            let vectors = gather_vectors(graph, provider, id)?;
            one(disparity::divergence(&vectors, &p))
        }
    };

    if !value.is_finite() || effective.is_some_and(|h| !h.is_finite()) {
        return Err(Error::NotFinite(id.name()));
    }
    Ok(MeasureOutput { value, effective })
}

fn one(value: f64) -> (f64, Option<f64>) {
    (value, None)
}

fn two((value, hill): (f64, f64)) -> (f64, Option<f64>) {
    (value, Some(hill))
}

/// Fetch the attached matrix, rejecting absence and node-count drift.
fn need_matrix(graph: &Graph) -> Result<MappedMutexGuard<'_, DistanceMatrix>> {
    let num_nodes = graph.len();
    let matrix = graph.matrix().ok_or(Error::MatrixMissing)?;
    if matrix.num_nodes() != num_nodes {
        return Err(Error::Precondition(format!(
            "distance matrix covers {} nodes but the graph has {num_nodes}; rebuild or re-attach",
            matrix.num_nodes(),
        )));
    }
    Ok(matrix)
}

/// Pull every node's vector out of the bound store, in node order.
fn gather_vectors(
    graph: &Graph,
    provider: Option<&dyn EmbeddingProvider>,
    id: MeasureId,
) -> Result<Vec<Arc<VectorData>>> {
    let provider = provider
        .ok_or_else(|| Error::Precondition(format!("{} needs a bound vector store", id.name())))?;
    let slots = graph.slots();
    let mut vectors = Vec::with_capacity(slots.len());
    for (i, slot) in slots.iter().enumerate() {
        let vector = provider.vector(*slot).ok_or_else(|| {
            Error::InvalidArgument(format!("node n{i} references missing store slot {slot}"))
        })?;
        vectors.push(vector);
    }
    Ok(vectors)
}

// ============================================================================
// Tests
// ============================================================================
