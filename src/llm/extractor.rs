use crate::catalogue::UnitTypeCatalogue;
use crate::error::{ConceptaError, Result};
use crate::extract::{extract_structured, Extractable, Extracted};
use crate::llm::client::{schema_hint, CompletionProvider, GeminiClient};
use crate::llm::config::GeminiConfig;
use crate::llm::prompts::*;
use crate::llm::types::*;
use crate::massing::{DesignDna, MassingAlternative, MassingNote, StyledMassing, StyledMaterials};
use crate::prompt::Bindings;
use crate::rendering::*;
use crate::schema::{ParcelRights, UnitMixPlan};
use chrono::Utc;
use futures::future::try_join_all;
use futures::try_join;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::Sender;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RightsExtraction {
    pub rights: ParcelRights,
    /// Free-text summary written by the model.
    pub report: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MassingExtraction {
    pub alternatives: Vec<MassingAlternative>,
    pub notes: Vec<MassingNote>,
}

/// Runs each pipeline stage: render the prompt, call the provider,
/// reconcile the answer.
pub struct ZoningExtractor<P> {
    provider: P,
    document_model: Option<String>,
    generation_model: Option<String>,
    image_model: Option<String>,
    prompts: PromptSet,
    catalogue: UnitTypeCatalogue,
    response_schemas: bool,
    progress: Option<Sender<PipelineEvent>>,
}

impl ZoningExtractor<GeminiClient> {
    pub fn from_config(config: GeminiConfig) -> Self {
        let document_model = config.document_model.clone();
        let generation_model = config.generation_model.clone();
        let image_model = config.image_model.clone();
        Self::new(GeminiClient::from_config(config))
            .with_document_model(document_model)
            .with_generation_model(generation_model)
            .with_image_model(image_model)
    }
}

impl<P: CompletionProvider> ZoningExtractor<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            document_model: None,
            generation_model: None,
            image_model: None,
            prompts: PromptSet::new(),
            catalogue: UnitTypeCatalogue::default(),
            response_schemas: false,
            progress: None,
        }
    }

    pub fn with_document_model(mut self, model: impl Into<String>) -> Self {
        self.document_model = Some(model.into());
        self
    }

    pub fn with_generation_model(mut self, model: impl Into<String>) -> Self {
        self.generation_model = Some(model.into());
        self
    }

    pub fn with_image_model(mut self, model: impl Into<String>) -> Self {
        self.image_model = Some(model.into());
        self
    }

    pub fn with_prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_catalogue(mut self, catalogue: UnitTypeCatalogue) -> Self {
        self.catalogue = catalogue;
        self
    }

    /// Also send each stage's JSON schema as the provider's response schema.
    /// Off by default; the prompts already carry the expected shape.
    pub fn with_response_schemas(mut self, enabled: bool) -> Self {
        self.response_schemas = enabled;
        self
    }

    pub fn with_progress(mut self, sender: Sender<PipelineEvent>) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    async fn send_event(&self, event: PipelineEvent) {
        if let Some(tx) = &self.progress {
            let _ = tx.send(event).await;
        }
    }

    fn model_for(&self, stage: Stage) -> Option<String> {
        if stage.renders_images() {
            self.image_model.clone()
        } else if stage.reads_documents() {
            self.document_model.clone()
        } else {
            self.generation_model.clone()
        }
    }

    async fn prepare(
        &self,
        stage: Stage,
        bindings: &Bindings,
        attachments: Vec<Attachment>,
        schema: Option<serde_json::Value>,
    ) -> Result<CompletionRequest> {
        self.send_event(PipelineEvent::Starting { stage }).await;

        let prompt = self.prompts.render(stage, bindings)?;
        self.send_event(PipelineEvent::PromptRendered {
            stage,
            chars: prompt.len(),
        })
        .await;

        self.send_event(PipelineEvent::AwaitingModel {
            stage,
            attachments: attachments.len(),
        })
        .await;
        Ok(CompletionRequest::new(prompt)
            .with_model(self.model_for(stage))
            .with_attachments(attachments)
            .with_schema(schema)
            .with_image_output(stage.renders_images()))
    }

    /// Render, call, and return raw text for one stage.
    async fn run_stage(
        &self,
        stage: Stage,
        bindings: &Bindings,
        attachments: Vec<Attachment>,
        schema: Option<serde_json::Value>,
    ) -> Result<String> {
        let request = self.prepare(stage, bindings, attachments, schema).await?;
        match self.provider.complete(request).await {
            Ok(raw) => {
                self.send_event(PipelineEvent::ProcessingResponse { stage }).await;
                Ok(raw)
            }
            Err(e) => {
                self.fail(stage, &e).await;
                Err(e)
            }
        }
    }

    async fn run_structured<T: Extractable>(
        &self,
        stage: Stage,
        bindings: &Bindings,
        attachments: Vec<Attachment>,
    ) -> Result<Extracted<T>> {
        let schema = if self.response_schemas {
            Some(schema_hint::<T>()?)
        } else {
            None
        };
        let raw = self.run_stage(stage, bindings, attachments, schema).await?;
        match extract_structured::<T>(&raw) {
            Ok(extracted) => Ok(extracted),
            Err(e) => {
                self.fail(stage, &e).await;
                Err(e)
            }
        }
    }

    /// Render, call, and return the first image for one stage.
    async fn run_render(
        &self,
        stage: Stage,
        bindings: &Bindings,
        attachments: Vec<Attachment>,
    ) -> Result<RenderedImage> {
        let request = self.prepare(stage, bindings, attachments, None).await?;
        let first = self
            .provider
            .render(request)
            .await
            .and_then(|images| {
                images.into_iter().next().ok_or_else(|| {
                    ConceptaError::Provider("model returned no image".to_string())
                })
            });
        match first {
            Ok(image) => {
                self.send_event(PipelineEvent::ProcessingResponse { stage }).await;
                Ok(image)
            }
            Err(e) => {
                self.fail(stage, &e).await;
                Err(e)
            }
        }
    }

    async fn fail(&self, stage: Stage, err: &ConceptaError) {
        warn!("Stage {} failed: {}", stage, err);
        self.send_event(PipelineEvent::Failed {
            stage,
            reason: err.to_string(),
        })
        .await;
    }

    /// Extracts the building envelope for one parcel from its zoning documents,
    /// then asks for a readable report on what was found.
    pub async fn extract_rights(
        &self,
        gush: &str,
        helka: &str,
        documents: Vec<Attachment>,
    ) -> Result<RightsExtraction> {
        if gush.trim().is_empty() {
            return Err(ConceptaError::validation("$.gush", "must not be empty"));
        }
        if helka.trim().is_empty() {
            return Err(ConceptaError::validation("$.helka", "must not be empty"));
        }
        if documents.is_empty() {
            return Err(ConceptaError::validation(
                "$.documents",
                "at least one document is required",
            ));
        }

        info!(
            "Analysing parcel gush {} helka {} from {} document(s)",
            gush,
            helka,
            documents.len()
        );

        let bindings = zoning_analysis_bindings(gush.trim(), helka.trim());
        let mut rights = self
            .run_structured::<ParcelRights>(Stage::ZoningAnalysis, &bindings, documents)
            .await?
            .value;
        rights.extracted_at = Some(Utc::now());
        self.send_event(PipelineEvent::Success {
            stage: Stage::ZoningAnalysis,
        })
        .await;

        if rights.parcel.helka.trim() != helka.trim() {
            warn!(
                "Requested helka {} but the model reported {}",
                helka, rights.parcel.helka
            );
        }

        let report = self
            .run_stage(
                Stage::RightsReport,
                &rights_report_bindings(&rights)?,
                Vec::new(),
                None,
            )
            .await?;
        self.send_event(PipelineEvent::Success {
            stage: Stage::RightsReport,
        })
        .await;

        info!(
            "Extracted {} units / {} sqm main area for helka {}",
            rights.rights.max_units, rights.rights.main_area_sqm, rights.parcel.helka
        );
        Ok(RightsExtraction {
            rights,
            report: report.trim().to_string(),
        })
    }

    /// Generates a floor-by-floor unit mix and reconciles it against both
    /// its own totals and the parcel rights.
    pub async fn generate_unit_mix(&self, rights: &ParcelRights) -> Result<Extracted<UnitMixPlan>> {
        info!(
            "Generating unit mix for {} units over {} floors",
            rights.rights.max_units, rights.rights.floors_max
        );

        let bindings = unit_mix_bindings(rights, &self.catalogue)?;
        let mut extracted = self
            .run_structured::<UnitMixPlan>(Stage::UnitMix, &bindings, Vec::new())
            .await?;

        extracted.value.generated_at = Some(Utc::now());
        extracted.discrepancies =
            crate::review_unit_mix(&extracted.value, Some(rights), &self.catalogue);

        if !extracted.discrepancies.is_empty() {
            warn!(
                "Unit mix has {} discrepancies: {}",
                extracted.discrepancies.len(),
                extracted
                    .discrepancies
                    .iter()
                    .map(|d| d.detail.as_str())
                    .collect::<Vec<_>>()
                    .join("; ")
            );
            self.send_event(PipelineEvent::Discrepancies {
                stage: Stage::UnitMix,
                count: extracted.discrepancies.len(),
            })
            .await;
        }
        self.send_event(PipelineEvent::Success {
            stage: Stage::UnitMix,
        })
        .await;

        Ok(extracted)
    }

    pub async fn generate_massing(&self, rights: &ParcelRights) -> Result<MassingExtraction> {
        let alternatives = self
            .run_structured::<Vec<MassingAlternative>>(
                Stage::MassingAlternatives,
                &massing_bindings(rights),
                Vec::new(),
            )
            .await?
            .value;

        let notes: Vec<MassingNote> = alternatives
            .iter()
            .flat_map(|m| m.check_envelope(rights))
            .collect();
        if !notes.is_empty() {
            warn!("{} massing alternative(s) exceed the envelope", notes.len());
        }

        info!("Generated {} massing alternatives", alternatives.len());
        self.send_event(PipelineEvent::Success {
            stage: Stage::MassingAlternatives,
        })
        .await;

        Ok(MassingExtraction {
            alternatives,
            notes,
        })
    }

    pub async fn analyze_reference(&self, image: Attachment) -> Result<DesignDna> {
        require_image(&image)?;

        let dna = self
            .run_structured::<DesignDna>(Stage::ReferenceAnalysis, &Bindings::new(), vec![image])
            .await?
            .value;
        info!("Reference style: {}", dna.architectural_style);
        self.send_event(PipelineEvent::Success {
            stage: Stage::ReferenceAnalysis,
        })
        .await;
        Ok(dna)
    }

    pub async fn style_massing(
        &self,
        massing: &MassingAlternative,
        dna: &DesignDna,
        reference: Option<&Attachment>,
    ) -> Result<StyledMassing> {
        let attachments = reference.cloned().into_iter().collect();
        let materials = self
            .run_structured::<StyledMaterials>(
                Stage::MassingStyling,
                &styling_bindings(massing, dna),
                attachments,
            )
            .await?
            .value;
        Ok(StyledMassing::new(massing.clone(), dna.clone(), materials))
    }

    /// Styles every massing concurrently. Any failure fails the whole batch;
    /// results come back in input order.
    pub async fn style_alternatives(
        &self,
        massings: &[MassingAlternative],
        dna: &DesignDna,
        reference: Option<&Attachment>,
    ) -> Result<Vec<StyledMassing>> {
        info!("Styling {} massing alternatives", massings.len());
        let styled = try_join_all(
            massings
                .iter()
                .map(|m| self.style_massing(m, dna, reference)),
        )
        .await?;
        self.send_event(PipelineEvent::Success {
            stage: Stage::MassingStyling,
        })
        .await;
        Ok(styled)
    }

    /// Describes the massing model image precisely enough to lock its
    /// geometry in later renders.
    pub async fn analyze_model(&self, model_image: Attachment) -> Result<String> {
        require_image(&model_image)?;
        let raw = self
            .run_stage(Stage::ModelAnalysis, &Bindings::new(), vec![model_image], None)
            .await?;
        self.send_event(PipelineEvent::Success {
            stage: Stage::ModelAnalysis,
        })
        .await;

        let description = raw.trim();
        if description.is_empty() {
            warn!("Model analysis came back empty; using the generic description");
            return Ok(DEFAULT_MODEL_DESCRIPTION.to_string());
        }
        Ok(description.to_string())
    }

    /// Reads the system logic and the primary materials of a reference
    /// building. Both questions are asked concurrently.
    pub async fn analyze_building_reference(&self, image: Attachment) -> Result<BuildingReference> {
        require_image(&image)?;
        let bindings = Bindings::new();
        let (intelligence, materials) = try_join!(
            self.run_structured::<ArchitecturalIntelligence>(
                Stage::BuildingIntelligence,
                &bindings,
                vec![image.clone()],
            ),
            self.run_structured::<Vec<DetectedMaterial>>(
                Stage::MaterialDetection,
                &bindings,
                vec![image],
            )
        )?;

        let reference = BuildingReference::new(intelligence.value, materials.value);
        info!(
            "Reference analysed: {} material(s) detected",
            reference.materials.len()
        );
        for stage in [Stage::BuildingIntelligence, Stage::MaterialDetection] {
            self.send_event(PipelineEvent::Success { stage }).await;
        }
        Ok(reference)
    }

    pub async fn render_variant(
        &self,
        variant: RenderVariant,
        model_image: &Attachment,
        model_description: &str,
        intelligence: &ArchitecturalIntelligence,
        settings: &RenderSettings,
    ) -> Result<RenderedAlternative> {
        let bindings = rendering_bindings(model_description, intelligence, variant, settings);
        let image = self
            .run_render(Stage::Rendering, &bindings, vec![model_image.clone()])
            .await?;
        info!("Rendered {} ({})", variant.label(), image.mime_type);
        Ok(RenderedAlternative::new(variant, image))
    }

    /// Renders the model under every [`RenderVariant`] concurrently.
    /// Results follow `RenderVariant::ALL`; one failed render fails the batch.
    pub async fn generate_alternatives(
        &self,
        model_image: &Attachment,
        model_description: &str,
        intelligence: &ArchitecturalIntelligence,
        settings: &RenderSettings,
    ) -> Result<Vec<RenderedAlternative>> {
        require_image(model_image)?;
        if model_description.trim().is_empty() {
            return Err(ConceptaError::validation(
                "$.model_description",
                "must not be empty",
            ));
        }

        info!("Rendering {} alternatives", RenderVariant::ALL.len());
        let rendered = try_join_all(RenderVariant::ALL.iter().map(|variant| {
            self.render_variant(*variant, model_image, model_description, intelligence, settings)
        }))
        .await?;
        self.send_event(PipelineEvent::Success {
            stage: Stage::Rendering,
        })
        .await;
        Ok(rendered)
    }
}

fn require_image(attachment: &Attachment) -> Result<()> {
    if attachment.is_image() {
        Ok(())
    } else {
        Err(ConceptaError::validation(
            "$.image.mime_type",
            format!("expected an image, got '{}'", attachment.mime_type),
        ))
    }
}
