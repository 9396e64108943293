use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use terrarisk::dataset::DatasetAccessor;
use terrarisk::ledger::WorkshopLedger;
use terrarisk::ranking::RankedMunicipality;
use terrarisk::store::MemoryStore;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) ledger: Arc<WorkshopLedger<MemoryStore>>,
    pub(crate) dataset: Arc<DatasetAccessor>,
    pub(crate) platform: Arc<Vec<RankedMunicipality>>,
    pub(crate) readiness: Arc<AtomicBool>,
    // None in tests; the Prometheus recorder can only be installed once per process.
    pub(crate) metrics: Option<Arc<PrometheusHandle>>,
}

#[cfg(test)]
pub(crate) const SAMPLE_CSV: &str = "\
cod_ibge,Municipio,nome_mesorregiao,idx_gobernanza_100,idx_biodiv,fire_risk_index,flooding_risks,idx_vulnerabilidad,pct_pobreza,pct_rural
3520699,Iporanga,Vale do Ribeira,20.0,90.0,80.0,70.0,85.0,60.0,62.3
3509502,Campinas,Campinas,85.0,40.0,15.0,10.0,25.0,12.0,2.1
3548500,Santos,Litoral,80.0,55.0,20.0,35.0,30.0,15.0,0.8
3549102,São Joaquim da Barra,Ribeirão Preto,35.0,65.0,55.0,20.0,60.0,40.0,4.6
3530201,Miracatu,Vale do Ribeira,30.0,80.0,60.0,65.0,75.0,55.0,48.9
3514809,Eldorado,Vale do Ribeira,25.0,30.0,70.0,60.0,80.0,58.0,54.1
3516309,Francisco Morato,Metropolitana,28.0,25.0,50.0,55.0,78.0,52.0,3.2
3550308,São Paulo,Metropolitana,75.0,35.0,30.0,45.0,40.0,20.0,1.3
3503901,Arujá,Metropolitana,60.0,30.0,35.0,30.0,45.0,28.0,8.7
3511508,Cerquilho,Piracicaba,65.0,28.0,25.0,15.0,35.0,22.0,5.4
3542602,Registro,Vale do Ribeira,45.0,70.0,40.0,50.0,55.0,38.0,22.6
";

#[cfg(test)]
pub(crate) fn test_state(csv: &str) -> AppState {
    use terrarisk::ranking::compute_platform_ranking;

    let dataset =
        DatasetAccessor::from_reader(csv.as_bytes()).expect("test dataset should parse");
    let platform = compute_platform_ranking(&dataset);
    AppState {
        ledger: Arc::new(WorkshopLedger::new(Arc::new(MemoryStore::default()), 10)),
        dataset: Arc::new(dataset),
        platform: Arc::new(platform),
        readiness: Arc::new(AtomicBool::new(true)),
        metrics: None,
    }
}
