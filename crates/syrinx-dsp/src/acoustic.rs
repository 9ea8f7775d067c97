/// Beak / glottis / OEC acoustic network: linear three-current block.
///
///   di1/dt = i2
///   di2/dt = -(1/(Ch*MG))*i1 - Rh*(1/MB + 1/MG)*i2 + (1/(MG*Ch) + Rh*RB/(MG*MB))*i3
///            + (1/MG)*dp_out/dt + (Rh*RB/(MG*MB))*p_out
///   di3/dt = -(MG/MB)*i2 - (Rh/MB)*i3 + (1/MB)*p_out
///
/// Forced by the tracheal drive. The coefficients only depend on the physical
/// constants, so they are folded once per run.

use crate::constants::PhysicalConstants;
use crate::tract::TractDrive;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcousticSubsystem {
    k_i1: f64,
    k_i2: f64,
    k_i3: f64,
    k_dp: f64,
    k_p: f64,
    m_i2: f64,
    m_i3: f64,
    m_p: f64,
}

impl AcousticSubsystem {
    pub fn new(c: &PhysicalConstants) -> Self {
        let ch = c.oec_compliance;
        let mg = c.glottis_inertance;
        let mb = c.beak_inertance;
        let rb = c.beak_resistance;
        let rh = c.oec_resistance;
        let coupling = rh * rb / (mg * mb);
        Self {
            k_i1: -1.0 / (ch * mg),
            k_i2: -rh * (1.0 / mb + 1.0 / mg),
            k_i3: 1.0 / (mg * ch) + coupling,
            k_dp: 1.0 / mg,
            k_p: coupling,
            m_i2: -mg / mb,
            m_i3: -rh / mb,
            m_p: 1.0 / mb,
        }
    }

    /// (di1/dt, di2/dt, di3/dt) for currents `[i1, i2, i3]`.
    #[inline]
    pub fn derivatives(&self, [i1, i2, i3]: [f64; 3], drive: TractDrive) -> [f64; 3] {
        [
            i2,
            self.k_i1 * i1 + self.k_i2 * i2 + self.k_i3 * i3 + self.k_dp * drive.dp_out + self.k_p * drive.p_out,
            self.m_i2 * i2 + self.m_i3 * i3 + self.m_p * drive.p_out,
        ]
    }
}
