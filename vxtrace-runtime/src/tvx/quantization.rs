use super::{impl_traced, Core};
use crate::vx::{self, QuantType};
use std::sync::Arc;
use vxtrace_core::trace::{Access, CallDescriptor, Forwardable, TraceSession, Traced};

/// Traced quantization. A value type: methods render as `quant_0.Method(...)`.
#[derive(Clone)]
pub struct Quantization {
    core: Core<vx::Quantization>,
}

impl_traced!(Quantization, vx::Quantization, "Quantization", Access::Value);

impl Quantization {
    fn construct(
        session: &Arc<TraceSession>,
        call: CallDescriptor<'_>,
        target: impl FnOnce() -> vx::Quantization,
    ) -> Self {
        let created = session.intercept_new(call, |_, _| {}, || Arc::new(target()));
        Self {
            core: Core::new(session, created),
        }
    }

    pub fn new(session: &Arc<TraceSession>) -> Self {
        let call = CallDescriptor::constructor("Quantization", session.prefix_for(Self::TYPE_NAME));
        Self::construct(session, call, vx::Quantization::new)
    }

    pub fn with_scale(session: &Arc<TraceSession>, qtype: QuantType, scale: f32, zero_point: i32) -> Self {
        let call = CallDescriptor::constructor("Quantization", session.prefix_for(Self::TYPE_NAME))
            .arg(&qtype)
            .arg(&scale)
            .arg(&zero_point);
        Self::construct(session, call, || {
            vx::Quantization::with_scale(qtype.forward(), scale.forward(), zero_point.forward())
        })
    }

    pub fn per_channel(
        session: &Arc<TraceSession>,
        qtype: QuantType,
        channel_dim: i32,
        scales: Vec<f32>,
        zero_points: Vec<i32>,
    ) -> Self {
        let call = CallDescriptor::constructor("Quantization", session.prefix_for(Self::TYPE_NAME))
            .arg(&qtype)
            .arg(&channel_dim)
            .arg(&scales)
            .arg(&zero_points);
        Self::construct(session, call, || {
            vx::Quantization::per_channel(
                qtype.forward(),
                channel_dim.forward(),
                scales.forward(),
                zero_points.forward(),
            )
        })
    }

    pub fn dynamic_fixed_point(session: &Arc<TraceSession>, qtype: QuantType, fl: i8) -> Self {
        let call = CallDescriptor::constructor("Quantization", session.prefix_for(Self::TYPE_NAME))
            .arg(&qtype)
            .arg(&fl);
        Self::construct(session, call, || {
            vx::Quantization::dynamic_fixed_point(qtype.forward(), fl.forward())
        })
    }

    pub fn qtype(&self) -> QuantType {
        self.session()
            .intercept(CallDescriptor::method(self, "Type"), || self.target().qtype())
    }

    pub fn set_type(&self, qtype: QuantType) -> &Self {
        self.session().intercept(CallDescriptor::method(self, "SetType").arg(&qtype), || {
            self.target().set_type(qtype.forward());
        });
        self
    }

    pub fn channel_dim(&self) -> i32 {
        self.session()
            .intercept(CallDescriptor::method(self, "ChannelDim"), || self.target().channel_dim())
    }

    pub fn set_channel_dim(&self, channel_dim: i32) -> &Self {
        let call = CallDescriptor::method(self, "SetChannelDim").arg(&channel_dim);
        self.session().intercept(call, || {
            self.target().set_channel_dim(channel_dim.forward());
        });
        self
    }

    pub fn scales(&self) -> Vec<f32> {
        self.session()
            .intercept(CallDescriptor::method(self, "Scales"), || self.target().scales())
    }

    pub fn set_scales(&self, scales: Vec<f32>) -> &Self {
        let call = CallDescriptor::method(self, "SetScales").arg(&scales);
        self.session().intercept(call, || {
            self.target().set_scales(scales.forward());
        });
        self
    }

    pub fn zero_points(&self) -> Vec<i32> {
        self.session()
            .intercept(CallDescriptor::method(self, "ZeroPoints"), || self.target().zero_points())
    }

    pub fn set_zero_points(&self, zero_points: Vec<i32>) -> &Self {
        let call = CallDescriptor::method(self, "SetZeroPoints").arg(&zero_points);
        self.session().intercept(call, || {
            self.target().set_zero_points(zero_points.forward());
        });
        self
    }

    pub fn fl(&self) -> i8 {
        self.session()
            .intercept(CallDescriptor::method(self, "Fl"), || self.target().fl())
    }
}
