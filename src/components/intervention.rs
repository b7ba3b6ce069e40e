//! Interventions that scale a rate from a configured year onwards.
//!
//! Interventions never write to the cohort table; they only register rate
//! pipeline modifiers during setup.

use crate::component::{Component, SetupContext};
use crate::config::{ConfigSchema, ValueKind};
use crate::error::Result;

use super::{MORTALITY_PIPELINE, incidence_pipeline};

/// Register a modifier multiplying `pipeline` by `scale` from `start_year`
fn register_scaling(
    context: &mut SetupContext<'_>,
    pipeline: &str,
    source: &str,
    scale: f64,
    start_year: i32,
) {
    log::info!("{source} scales '{pipeline}' by {scale} from {start_year}");
    context.pipelines.register_modifier(
        pipeline,
        source,
        Box::new(move |time, _, rates| {
            if time.year() >= start_year {
                rates.iter_mut().for_each(|rate| *rate *= scale);
            }
            Ok(())
        }),
    );
}

/// Read `intervention.<name>.year`, defaulting to the first simulated year
fn start_year(context: &SetupContext<'_>, name: &str) -> Result<i32> {
    let default = i64::from(context.clock().start().year());
    let year = context
        .config()
        .get_i64_or(&format!("intervention.{name}.year"), default)?;
    i32::try_from(year).map_err(|_| crate::error::SimulationError::ConfigurationType {
        key: format!("intervention.{name}.year"),
        expected: ValueKind::Integer,
        found: year.to_string(),
    })
}

/// Scales all-cause mortality by `intervention.<name>.scale`
#[derive(Debug, Clone)]
pub struct ModifyAllCauseMortality {
    name: String,
}

impl ModifyAllCauseMortality {
    /// Create the intervention `name`
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    fn scale_key(&self) -> String {
        format!("intervention.{}.scale", self.name)
    }
}

impl Component for ModifyAllCauseMortality {
    fn name(&self) -> &str {
        &self.name
    }

    fn configuration_schema(&self) -> ConfigSchema {
        ConfigSchema::new()
            .required(&self.scale_key(), ValueKind::Float)
            .optional(&format!("intervention.{}.year", self.name), ValueKind::Integer)
    }

    fn setup(&mut self, context: &mut SetupContext<'_>) -> Result<()> {
        let scale = context.config().get_f64(&self.scale_key())?;
        let year = start_year(context, &self.name)?;
        let source = format!("ModifyAllCauseMortality({})", self.name);
        register_scaling(context, MORTALITY_PIPELINE, &source, scale, year);
        Ok(())
    }
}

/// Scales the incidence of one disease by
/// `intervention.<name>.<disease>_incidence_scale`
#[derive(Debug, Clone)]
pub struct ModifyDiseaseIncidence {
    name: String,
    disease: String,
}

impl ModifyDiseaseIncidence {
    /// Create the intervention `name` acting on `disease`
    #[must_use]
    pub fn new(name: &str, disease: &str) -> Self {
        Self {
            name: name.to_string(),
            disease: disease.to_string(),
        }
    }

    fn scale_key(&self) -> String {
        format!("intervention.{}.{}_incidence_scale", self.name, self.disease)
    }
}

impl Component for ModifyDiseaseIncidence {
    fn name(&self) -> &str {
        &self.name
    }

    fn configuration_schema(&self) -> ConfigSchema {
        ConfigSchema::new()
            .required(&self.scale_key(), ValueKind::Float)
            .optional(&format!("intervention.{}.year", self.name), ValueKind::Integer)
    }

    fn setup(&mut self, context: &mut SetupContext<'_>) -> Result<()> {
        let scale = context.config().get_f64(&self.scale_key())?;
        let year = start_year(context, &self.name)?;
        let source = format!("ModifyDiseaseIncidence({}, {})", self.name, self.disease);
        register_scaling(
            context,
            &incidence_pipeline(&self.disease),
            &source,
            scale,
            year,
        );
        Ok(())
    }
}
